use super::Visit;
use hcl::{
    template::{Directive, Element},
    Body, Expression, Identifier, ObjectKey, Operation, Structure, Template, Traversal,
    TraversalOperator,
};

/// Recursively visit all [hcl::Traversal]s
pub trait VisitTraversals {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>);
}

impl VisitTraversals for Body {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        for structure in self.iter() {
            match structure {
                Structure::Attribute(attr) => attr.expr.visit_traversals(visitor),
                Structure::Block(block) => block.body.visit_traversals(visitor),
            }
        }
    }
}

impl VisitTraversals for Expression {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        match self {
            Expression::Variable(variable) => {
                // a standalone variable is a traversal with no operators...kind of
                let traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit(&traversal);
            }
            Expression::Traversal(traversal) => {
                visitor.visit(traversal);
                for operator in &traversal.operators {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals(visitor);
                    }
                }
                if !matches!(traversal.expr, Expression::Variable(_)) {
                    traversal.expr.visit_traversals(visitor);
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let ObjectKey::Expression(key) = key {
                        key.visit_traversals(visitor);
                    }
                    value.visit_traversals(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_traversals(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_traversals(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals(visitor);
                cond.true_expr.visit_traversals(visitor);
                cond.false_expr.visit_traversals(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals(visitor);
                    binop.rhs_expr.visit_traversals(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_traversals(visitor);

                let mut scoped =
                    Scoped::new(forexpr.key_var.as_ref(), &forexpr.value_var, visitor);
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(&mut scoped));
                forexpr.value_expr.visit_traversals(&mut scoped);
                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(&mut scoped));
            }
            _ => {}
        }
    }
}

impl VisitTraversals for Template {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_traversals(visitor);
                        ifdir.true_template.visit_traversals(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_traversals(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_traversals(visitor);

                        let mut scoped =
                            Scoped::new(fordir.key_var.as_ref(), &fordir.value_var, visitor);
                        fordir.template.visit_traversals(&mut scoped);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

/// Drops traversals rooted at the iterator variables of a `for`
struct Scoped<'a> {
    bound: Vec<&'a str>,
    visitor: &'a mut dyn Visit<Traversal>,
}

impl<'a> Scoped<'a> {
    fn new(
        key_var: Option<&'a Identifier>,
        value_var: &'a Identifier,
        visitor: &'a mut dyn Visit<Traversal>,
    ) -> Self {
        let bound = key_var
            .into_iter()
            .chain([value_var])
            .map(Identifier::as_str)
            .collect();
        Self { bound, visitor }
    }
}

impl Visit<Traversal> for Scoped<'_> {
    fn visit(&mut self, traversal: &Traversal) {
        if let Expression::Variable(root) = &traversal.expr {
            if self.bound.contains(&root.as_str()) {
                return;
            }
        }
        self.visitor.visit(traversal)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn visited(source: &str) -> Vec<(String, usize)> {
        let body = hcl::parse(source).unwrap();
        let mut seen = vec![];
        let mut collect = |traversal: &Traversal| {
            let Expression::Variable(root) = &traversal.expr else {
                panic!("traversal without variable root");
            };
            seen.push((root.as_str().to_owned(), traversal.operators.len()))
        };
        body.visit_traversals(&mut collect);
        seen
    }

    #[test]
    fn finds_nested_traversals() {
        let seen = visited(
            r#"
            a = var.x
            b = "${local.prefix}-${upper(var.y)}"
            c = [for s in data.d.n.ids : s if s != var.z]
            inner {
              d = cond ? one.two : three[four.five]
            }
            "#,
        );

        let expected: [(&str, usize); 9] = [
            ("var", 1),
            ("local", 1),
            ("var", 1),
            ("data", 3),
            ("var", 1),
            ("cond", 0),
            ("one", 1),
            ("three", 1),
            ("four", 1),
        ];
        assert_eq!(
            seen,
            expected.map(|(root, len)| (root.to_string(), len)).to_vec()
        );
    }

    #[test]
    fn skips_iterator_variables() {
        let seen = visited(
            r#"
            m = {for k, v in var.map : k => v.name if v.enabled}
            n = [for s in s.items : [for t in s.children : t.id if t != var.skip]]
            o = "%{ for host in var.hosts }${host.name}:${local.port} %{ endfor }"
            p = k
            "#,
        );

        let expected: [(&str, usize); 6] = [
            ("var", 1),
            ("s", 1),
            ("var", 1),
            ("var", 1),
            ("local", 1),
            ("k", 0),
        ];
        assert_eq!(
            seen,
            expected.map(|(root, len)| (root.to_string(), len)).to_vec()
        );
    }
}
