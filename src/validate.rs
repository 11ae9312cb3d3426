//! Static checks on the handler source before we spend time compiling it.
//!
//! A deployable handler must have a `main` function that hands control to
//! the Lambda runtime, i.e. somewhere calls `lambda_runtime::run` (or one of
//! the `start`-style entry points). This is a syntactic check only.

use std::path::Path;

use syn::{visit::Visit, Expr, ExprCall, Item};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("failed to read handler source {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse handler source {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: syn::Error,
    },

    #[error("no main function found in handler source")]
    MissingMain,

    #[error("main does not hand control to the lambda runtime (expected a lambda_runtime::run call)")]
    MissingRuntimeStart,
}

/// Validate the handler source rooted at `source`. Accepts either a path to
/// a `.rs` file or a crate directory (in which case `src/main.rs` is
/// checked).
pub fn validate_handler(source: &Path) -> Result<(), ValidationError> {
    let path = entry_point(source);
    let code = std::fs::read_to_string(&path).map_err(|source| ValidationError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file = syn::parse_file(&code).map_err(|source| ValidationError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let has_main = file.items.iter().any(|item| match item {
        Item::Fn(func) => func.sig.ident == "main",
        _ => false,
    });
    if !has_main {
        return Err(ValidationError::MissingMain);
    }

    let mut finder = RuntimeStartFinder { found: false };
    finder.visit_file(&file);
    if !finder.found {
        return Err(ValidationError::MissingRuntimeStart);
    }
    Ok(())
}

fn entry_point(source: &Path) -> std::path::PathBuf {
    if source.extension().map(|ext| ext == "rs").unwrap_or(false) {
        source.to_path_buf()
    } else {
        source.join("src").join("main.rs")
    }
}

struct RuntimeStartFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for RuntimeStartFinder {
    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(path) = &*node.func {
            if let Some(segment) = path.path.segments.last() {
                let name = segment.ident.to_string();
                if name == "run" || name.starts_with("start") {
                    self.found = true;
                }
            }
        }
        syn::visit::visit_expr_call(self, node);
    }
}
