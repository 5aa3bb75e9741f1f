use crate::visit::{self, VisitTraversals};
use hcl::{Expression, Traversal, TraversalOperator};
use std::collections::BTreeSet;

/// Collects the configuration objects an expression refers to
///
/// `aws_instance.web.private_ip` refers to `aws_instance.web`, `data.aws_ami.ubuntu.id` to `data.aws_ami.ubuntu` and
/// `var.region` to `var.region`. Traversals rooted at `count`, `each`, `self`, `path` and `terraform` don't refer to
/// anything in the configuration and are ignored.
#[derive(Default, Debug)]
pub(crate) struct ReferenceCollector {
    pub references: BTreeSet<String>,
}

impl visit::Visit<Traversal> for ReferenceCollector {
    fn visit(&mut self, traversal: &Traversal) {
        if let Some(address) = reference_address(&traversal.get_longest_path()) {
            self.references.insert(address);
        }
    }
}

impl ReferenceCollector {
    pub fn collect(&mut self, subject: &impl VisitTraversals) {
        subject.visit_traversals(self);
    }
}

fn reference_address(path: &[&str]) -> Option<String> {
    let len = match *path.first()? {
        "count" | "each" | "self" | "path" | "terraform" => return None,
        "data" => 3,
        _ => 2,
    };

    if path.len() < len {
        return None;
    }

    Some(path[..len].join("."))
}

/// `aws.west` for `provider = aws.west`
pub(crate) fn traversal_path(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Variable(var) => Some(var.as_str().to_owned()),
        Expression::Traversal(traversal) => {
            let path = traversal.get_longest_path();
            (!path.is_empty()).then(|| path.join("."))
        }
        _ => None,
    }
}

pub(crate) trait TraversalExt {
    fn get_longest_path(&self) -> Vec<&str>;
}

impl TraversalExt for Traversal {
    /// Root variable followed by all leading attribute accesses
    fn get_longest_path(&self) -> Vec<&str> {
        let Expression::Variable(var) = &self.expr else {
            return vec![];
        };

        let mut path = vec![var.as_str()];
        for operator in &self.operators {
            let TraversalOperator::GetAttr(ident) = operator else {
                break;
            };

            path.push(ident.as_str());
        }

        path
    }
}
