//! # flat-earth - a configuration directory as an editable graph
//!
//! `flat-earth` serves a directory of terraform style configuration files over HTTP: the resource dependency graph,
//! the provider schemas, creation of new blocks and in-place updates of single attributes.
//!
//! ## Introduction for developers
//!
//! ### HCL Terms
//!
//! In hcl terms...
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`:
//!     - 1 `identifier`
//!     - followed by 0 or more `labels`
//!     - and a `body` enclosed in `{` and `}`
//!
//! ```hcl
//! resource "aws_instance" "web" {
//!   ami   = data.aws_ami.ubuntu.id # a reference
//!   count = 2
//!
//!   lifecycle {
//!     create_before_destroy = true
//!   }
//! }
//! ```
//!
//! Two crates model these documents. [hcl_edit] keeps every byte of the source (whitespace, comments) and is used
//! wherever files are read or rewritten. [hcl] (`hcl-rs`) has the friendlier expression types and is used to build
//! new blocks, find references and evaluate constants.
//!
//! ### Finding files
//!
//! [hcl_documents::ConfigRoot] lists the configuration files of a root directory in a fixed order. Everything that
//! searches the configuration relies on that order: when two files declare the same block, the first one wins.
//!
//! ### The graph
//!
//! see [toolchain::HclToolchain]
//!
//! `resource` and `data` blocks are collected into a [toolchain::ResourceGraph]. All traversals in a resource's
//! expressions are references, those pointing at other resources are dependencies.
//!
//! | **expression**                 | **reference**          |
//! |--------------------------------|------------------------|
//! | `aws_vpc.main.id`              | `aws_vpc.main`         |
//! | `data.aws_ami.ubuntu.id`       | `data.aws_ami.ubuntu`  |
//! | `var.region`                   | `var.region`           |
//! | `"${count.index}"`             |                        |
//!
//! [snapshot] turns the graph into the JSON served to clients.
//!
//! ### Editing
//!
//! An update
//! 1. decodes the new value from its `{type, value}` wire form ([value])
//! 2. locates the declaring block ([locator])
//! 3. replaces the attribute's value in the parsed document ([editor])
//! 4. writes the whole document back atomically
//!
//! Only the value expression changes, the rest of the file stays byte for byte as it was.
//!
//! ### Serving
//!
//! see [service::GraphService]
pub mod builder;
pub mod editor;
pub mod hcl_documents;
pub mod locator;
pub mod service;
pub mod snapshot;
pub mod toolchain;
mod util;
pub mod value;
mod visit;
