//! `.mc` compiler: source → tokens → AST → evaluated values and music
//! library side effects.

pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod token;
pub mod types;
pub mod value;

pub use ast::Program;
pub use compile::{EvalOptions, Evaluator};
pub use error::{CompileError, ErrorCollector};
pub use symbols::{DefState, SymbolTable};
pub use value::Payload;

use std::path::Path;

use tracing::{debug, info};

use crate::music::MusicLibrary;

/// File suffix the compiler accepts.
pub const SOURCE_EXTENSION: &str = "mc";

/// Result of evaluating one file: the AST and the file-scope variables.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    symbols: SymbolTable,
}

impl Compilation {
    /// Current payload of a file-scope variable.
    pub fn value(&self, name: &str) -> Option<&Payload> {
        let slot = self.symbols.lookup(name).ok()?;
        Some(&self.symbols.slot(slot).payload)
    }

    pub fn def_state(&self, name: &str) -> Option<DefState> {
        self.symbols.def_state(self.symbols.lookup(name).ok()?)
    }
}

/// The `.mc` compiler.
///
/// Each call is independent; the only state shared across files is the
/// caller's [`ErrorCollector`].
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: EvalOptions,
}

impl Compiler {
    pub fn new(options: EvalOptions) -> Self {
        Self { options }
    }

    /// Lex and parse `source`. Returns None when parsing failed; the
    /// reason is in `errors`.
    pub fn parse(source: &str, file: &str, errors: &mut ErrorCollector) -> Option<Program> {
        let tokens = lexer::tokenize(source, file, errors);
        let program = parser::parse(&tokens, errors)?;
        debug!(file, items = program.items.len(), "parsed");
        Some(program)
    }

    /// Parse and evaluate `source`, sending music to `library`.
    pub fn compile(
        &self,
        source: &str,
        file: &str,
        library: &mut dyn MusicLibrary,
        errors: &mut ErrorCollector,
    ) -> Option<Compilation> {
        let program = Self::parse(source, file, errors)?;
        let mut evaluator = Evaluator::new(library, self.options);
        evaluator.run(&program, errors);
        Some(Compilation {
            program,
            symbols: evaluator.into_symbols(),
        })
    }

    /// Check the suffix, read and compile the file at `path`.
    pub fn compile_file(
        &self,
        path: &Path,
        library: &mut dyn MusicLibrary,
        errors: &mut ErrorCollector,
    ) -> Option<Compilation> {
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            errors.add(CompileError::io(format!(
                "unknown file type: '{}'",
                path.display()
            )));
            return None;
        }
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                debug!(error = %e, "read failed");
                errors.add(CompileError::io(format!(
                    "could not read file: '{}'",
                    path.display()
                )));
                return None;
            }
        };
        info!(file = %path.display(), "compiling");
        self.compile(&source, &path.to_string_lossy(), library, errors)
    }
}
