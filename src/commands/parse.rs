//! @acp:module "Parse Command"
//! @acp:summary "Parse one type expression and show its canonical form"
//! @acp:domain cli
//! @acp:layer handler

use anyhow::Result;
use console::style;

use crate::types::{self, TypeExpr};

/// Options for the parse command
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// The type expression text
    pub expression: String,
    /// Print the tree as JSON
    pub json: bool,
}

/// Execute the parse command
pub fn execute_parse(options: ParseOptions) -> Result<()> {
    match types::parse(&options.expression) {
        Ok(expr) => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(&expr)?);
            } else {
                print_expr(&expr);
            }
            Ok(())
        }
        Err(e) => {
            if options.json {
                let output = serde_json::json!({
                    "error": {
                        "kind": e.kind,
                        "position": e.position,
                        "message": e.to_string(),
                    }
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("{} {}", style("✗").red(), e);
                eprintln!("  {}", options.expression);
                let column = caret_column(&options.expression, e.position);
                eprintln!("  {}{}", " ".repeat(column), style("^").red());
            }
            std::process::exit(1);
        }
    }
}

/// Display column of a byte offset into `expression`.
fn caret_column(expression: &str, position: usize) -> usize {
    match expression.get(..position) {
        Some(prefix) => prefix.chars().count(),
        None => expression.chars().count(),
    }
}

fn print_expr(expr: &TypeExpr) {
    println!("{} {}", style("✓").green(), style(expr).bold());
    let leaves = expr.leaf_names();
    if !leaves.is_empty() {
        println!("\n{}", style("Names").bold());
        for leaf in leaves {
            println!("  {}", leaf.join("."));
        }
    }
}
