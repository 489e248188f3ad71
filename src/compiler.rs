//! The compilation context: entry points, the expression cache, and
//! multi-line document compilation.
//!
//! A [`Context`] owns the mutable registries ([`SyntaxTable`] and
//! [`Registry`]) plus the compiled-expression cache. Nothing here is
//! process-global: independent contexts are fully isolated, and a context
//! assumes single-threaded use (callers wanting parallel compilation give
//! each worker its own context).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::display;
use crate::error::{CompileError, EvalError};
use crate::lexer;
use crate::node::Node;
use crate::parser::{self, postprocess::postprocess};
use crate::registry::Registry;
use crate::simplify;
use crate::syntax::SyntaxTable;

/// A compiled statement of a multi-line document.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The 1-based source line the statement completed on.
    pub line: usize,
    /// The compiled tree.
    pub node: Node,
}

/// A cooperative cancellation flag, polled once per source line during
/// document compilation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, unraised token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; the next per-line poll aborts with
    /// [`CompileError::Cancelled`].
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// An isolated compilation and rewriting context.
#[derive(Debug, Clone)]
pub struct Context {
    syntax: SyntaxTable,
    registry: Registry,
    cache: HashMap<String, Node>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            syntax: SyntaxTable::new(),
            registry: Registry::new(),
            cache: HashMap::new(),
        }
    }
}

impl Context {
    /// A context populated with the built-in syntax and operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// The syntax table driving compilation and stringification.
    pub fn syntax(&self) -> &SyntaxTable {
        &self.syntax
    }

    /// Mutable access to the syntax table, for external syntax
    /// registration.
    pub fn syntax_mut(&mut self) -> &mut SyntaxTable {
        &mut self.syntax
    }

    /// The operation registry driving simplification.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, for external operation
    /// registration.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Compiles a single expression into a tree.
    ///
    /// Results are cached by the exact source string; the cache is purely
    /// a performance device and carries no semantics.
    pub fn compile(&mut self, expr: &str) -> Result<Node, CompileError> {
        if let Some(cached) = self.cache.get(expr) {
            trace!("cache hit for {expr:?}");
            return Ok(cached.clone());
        }

        validate(expr)?;
        let tokens = lexer::lex(expr, &self.syntax)?;
        if tokens.is_empty() {
            return Err(CompileError::EmptyString);
        }
        let raw = parser::parse(&tokens, &self.syntax)?;
        let node = postprocess(raw, &mut self.syntax)?;

        self.cache.insert(expr.to_string(), node.clone());
        Ok(node)
    }

    /// Compiles a multi-line document into line-numbered statements.
    ///
    /// Comment lines (leading `#`) and blank lines are skipped; statements
    /// may span physical lines as long as a bracket stays open; a hard
    /// error aborts the whole document with its line number attached.
    pub fn compile_document(
        &mut self,
        document: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Statement>, CompileError> {
        let lines: Vec<&str> = document.lines().collect();
        let mut statements = Vec::new();
        let mut buffer: Option<String> = None;
        let mut depth = [0i64; 3];

        for (i, raw) in lines.iter().enumerate() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(CompileError::Cancelled);
                }
            }

            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let delta = count_open_brackets(line);
            for (d, change) in depth.iter_mut().zip(delta) {
                *d += change;
            }
            for (d, label) in depth.iter().zip(["()", "[]", "{}"]) {
                if *d < 0 {
                    return Err(
                        CompileError::Syntax(format!("{label} mismatch in \"{line}\""))
                            .on_line(i + 1),
                    );
                }
            }

            if depth.iter().any(|d| *d > 0) {
                // an open bracket spans into the next line
                buffer.get_or_insert_with(String::new).push_str(line);
                continue;
            }
            let full = match buffer.take() {
                Some(mut pending) => {
                    pending.push_str(line);
                    pending
                }
                None => line.to_string(),
            };

            match self.compile(&full) {
                Ok(node) => {
                    debug!("compiled line {}: {full:?}", i + 1);
                    statements.push(Statement { line: i + 1, node });
                }
                // blank results are dropped, never fatal, in documents
                Err(CompileError::EmptyString) => {}
                Err(err) => return Err(err.on_line(i + 1)),
            }
        }

        if depth.iter().any(|d| *d != 0) {
            return Err(
                CompileError::Syntax("bracket mismatch".into()).on_line(lines.len()),
            );
        }
        Ok(statements)
    }

    /// Simplifies a compiled tree against this context's registry.
    pub fn simplify(&self, node: &Node) -> Result<Node, EvalError> {
        simplify::simplify(node, &self.registry)
    }

    /// Renders a tree back into compilable source text.
    pub fn stringify(&self, node: &Node) -> String {
        display::stringify(node, &self.syntax)
    }

    /// Resets syntax, operations, and the cache to the built-in state.
    /// Required for test isolation: rewrite rules and syntax are mutually
    /// registered, so both reset together.
    pub fn restore_default(&mut self) {
        self.syntax.restore_default();
        self.registry.restore_default();
        self.cache.clear();
    }
}

/// Pre-lex validation: per-kind bracket counts must balance and quotes
/// must pair up. Counting ignores bracket characters inside string
/// literals.
fn validate(expr: &str) -> Result<(), CompileError> {
    if expr.trim().is_empty() {
        return Err(CompileError::EmptyString);
    }
    let (stripped, quotes) = strip_quoted(expr);
    if quotes % 2 != 0 {
        return Err(CompileError::Syntax(format!("\" mismatch in \"{expr}\"")));
    }
    for (open, close, label) in [('(', ')', "()"), ('[', ']', "[]"), ('{', '}', "{}")] {
        let opens = stripped.chars().filter(|c| *c == open).count();
        let closes = stripped.chars().filter(|c| *c == close).count();
        if opens != closes {
            return Err(CompileError::Syntax(format!(
                "{label} mismatch in \"{expr}\""
            )));
        }
    }
    Ok(())
}

/// Removes quoted substrings (so their brackets are inert) and counts the
/// unescaped quote characters seen.
fn strip_quoted(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut quotes = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                quotes += 1;
                in_string = false;
            }
        } else if c == '"' {
            quotes += 1;
            in_string = true;
        } else {
            out.push(c);
        }
    }
    (out, quotes)
}

/// Net open-bracket count per kind (`()`, `[]`, `{}`), quoted text
/// excluded.
fn count_open_brackets(line: &str) -> [i64; 3] {
    let (stripped, _) = strip_quoted(line);
    let mut depth = [0i64; 3];
    for c in stripped.chars() {
        match c {
            '(' => depth[0] += 1,
            ')' => depth[0] -= 1,
            '[' => depth[1] += 1,
            ']' => depth[1] -= 1,
            '{' => depth[2] += 1,
            '}' => depth[2] -= 1,
            _ => {}
        }
    }
    depth
}
