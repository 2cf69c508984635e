//! Evaluator: walks the AST, materializes declarations as slots and folds
//! every expression into a typed [`Value`].
//!
//! Semantic errors are caught per top-level item, per block item and per
//! declarator, and collected; they never abort the whole file.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::ast::*;
use super::error::{CompileError, ErrorCollector, Range};
use super::symbols::{DefState, SlotId, SymbolTable};
use super::token::Token;
use super::types::MusicType;
use super::value::{self, IndexError, LiteralKind, OpError, Payload, Value};
use crate::music::MusicLibrary;

type EvalResult<T> = Result<T, CompileError>;

fn semantic(message: impl Into<String>, range: &Range) -> CompileError {
    CompileError::semantic(message, Some(range.clone()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Fill `note`/`chord` arrays declared without an initializer with the
    /// library's zero value.
    pub populate_array_defaults: bool,
    pub max_loop_iterations: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            populate_array_defaults: true,
            max_loop_iterations: 100_000,
        }
    }
}

/// Where evaluation currently is. Copied, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub is_global: bool,
    pub in_loop: bool,
}

impl Context {
    pub fn global() -> Self {
        Self {
            is_global: true,
            in_loop: false,
        }
    }

    pub fn with_global(self, is_global: bool) -> Self {
        Self { is_global, ..self }
    }

    pub fn with_loop(self, in_loop: bool) -> Self {
        Self { in_loop, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// A resolved storage location.
#[derive(Debug, Clone, PartialEq)]
enum Place {
    Slot(SlotId),
    /// Element of an array slot, one index per dimension.
    Element(SlotId, Vec<i64>),
}

pub struct Evaluator<'a> {
    symbols: SymbolTable,
    library: &'a mut dyn MusicLibrary,
    options: EvalOptions,
    /// Places resolved during the current full expression.
    places: HashMap<ExprId, Place>,
    /// Scratch slot per string literal or subscripted value, reused on
    /// every evaluation of that node.
    temps: HashMap<ExprId, SlotId>,
}

impl<'a> Evaluator<'a> {
    pub fn new(library: &'a mut dyn MusicLibrary, options: EvalOptions) -> Self {
        Self {
            symbols: SymbolTable::new(),
            library,
            options,
            places: HashMap::new(),
            temps: HashMap::new(),
        }
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    /// Evaluate every top-level item in order.
    pub fn run(&mut self, program: &Program, errors: &mut ErrorCollector) {
        let ctx = Context::global();
        for item in &program.items {
            if let Err(e) = self.exec(item, ctx, errors) {
                errors.add(e);
            }
        }
        debug!(items = program.items.len(), "evaluated program");
    }

    fn exec(&mut self, stmt: &Stmt, ctx: Context, errors: &mut ErrorCollector) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::Declaration(decl) => {
                self.declare(decl, ctx, errors)?;
                Ok(Flow::Normal)
            }
            StmtKind::Compound(items) => Ok(self.exec_block(items, ctx, errors)),
            StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Expr(expr) => {
                self.eval_full(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_full(cond)?.payload.truthy() {
                    self.exec(then, ctx, errors)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, ctx, errors)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                self.exec_while(cond, body, ctx, errors)?;
                Ok(Flow::Normal)
            }
            StmtKind::Break if ctx.in_loop => Ok(Flow::Break),
            StmtKind::Break => Err(semantic("break statement not in loop", &stmt.range)),
            StmtKind::Continue if ctx.in_loop => Ok(Flow::Continue),
            StmtKind::Continue => Err(semantic("continue statement not in loop", &stmt.range)),
        }
    }

    /// Run a block in its own scope. A break or continue stops the block
    /// and is handed to the enclosing loop.
    fn exec_block(&mut self, items: &[Stmt], ctx: Context, errors: &mut ErrorCollector) -> Flow {
        self.symbols.new_scope();
        let ctx = ctx.with_global(false);
        let mut flow = Flow::Normal;
        for item in items {
            match self.exec(item, ctx, errors) {
                Ok(Flow::Normal) => {}
                Ok(jump) => {
                    flow = jump;
                    break;
                }
                Err(e) => errors.add(e),
            }
        }
        self.symbols.end_scope();
        flow
    }

    fn exec_while(
        &mut self,
        cond: &Expr,
        body: &Stmt,
        ctx: Context,
        errors: &mut ErrorCollector,
    ) -> EvalResult<()> {
        let mut iterations = 0u64;
        while self.eval_full(cond)?.payload.truthy() {
            iterations += 1;
            if iterations > self.options.max_loop_iterations {
                return Err(semantic(
                    format!(
                        "loop did not terminate within {} iterations",
                        self.options.max_loop_iterations
                    ),
                    &cond.range,
                ));
            }
            if self.exec(body, ctx.with_loop(true), errors)? == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    // ---- declarations ----

    fn declare(&mut self, decl: &Declaration, ctx: Context, errors: &mut ErrorCollector) -> EvalResult<()> {
        let base = specs_type(&decl.specs)?;
        for (declarator, init) in decl.decls.iter().zip(&decl.inits) {
            if let Err(e) = self.declare_one(&base, declarator, init.as_ref(), ctx) {
                errors.add(e);
            }
        }
        Ok(())
    }

    fn declare_one(
        &mut self,
        base: &MusicType,
        declarator: &Declarator,
        init: Option<&Expr>,
        ctx: Context,
    ) -> EvalResult<()> {
        let ty = self.declarator_type(declarator, base.clone())?;
        let name = declarator
            .name()
            .ok_or_else(|| semantic("missing identifier name in declaration", declarator.range()))?;

        let state = match (init, ctx.is_global) {
            (Some(_), _) => DefState::Defined,
            (None, true) => DefState::Tentative,
            (None, false) => DefState::Undefined,
        };
        let slot = self.symbols.add_variable(name, ty.clone(), state);

        match init {
            Some(expr) => {
                let value = self.eval_full(expr)?;
                let payload = self.coerce(&ty, &value, &expr.range)?;
                self.symbols.slot_mut(slot).payload = payload;
            }
            None if ty.is_array() && self.symbols.slot(slot).payload == Payload::Unset => {
                let payload = self.array_default(&ty);
                self.symbols.slot_mut(slot).payload = payload;
            }
            None => {}
        }
        debug!(name, ty = %ty, ?state, "declared");
        Ok(())
    }

    /// Apply the declarator's array dimensions to `prev`, outermost
    /// declarator node first.
    fn declarator_type(&mut self, declarator: &Declarator, prev: MusicType) -> EvalResult<MusicType> {
        match declarator {
            Declarator::Identifier { .. } => Ok(prev),
            Declarator::Array { size, child, range } => {
                let n = match size {
                    Some(expr) => Some(self.array_size(expr, range)?),
                    None => None,
                };
                let ty = MusicType::array_of(prev, n);
                if element_count(&ty) > value::MAX_ELEMENTS {
                    return Err(semantic("array is too large", range));
                }
                self.declarator_type(child, ty)
            }
        }
    }

    fn array_size(&mut self, expr: &Expr, range: &Range) -> EvalResult<usize> {
        let value = self.eval_full(expr)?;
        if !value.ty.is_integral() {
            return Err(semantic("array size must have integral type", range));
        }
        if value.literal.is_none() {
            return Err(semantic("array size must be compile-time constant", range));
        }
        match value.payload.as_int() {
            Some(n) if n > 0 => {
                usize::try_from(n).map_err(|_| semantic("array is too large", range))
            }
            _ => Err(semantic("array size must be positive", range)),
        }
    }

    /// Initial payload of an array declared without an initializer: a list
    /// per dimension, filled with the library's zero value when the policy
    /// allows and the element type has one.
    fn array_default(&mut self, ty: &MusicType) -> Payload {
        let mut leaf = ty;
        while let Some(el) = leaf.element() {
            leaf = el;
        }
        let fill = if self.options.populate_array_defaults {
            self.library.zero(leaf).unwrap_or(Payload::Unset)
        } else {
            Payload::Unset
        };
        shape(ty, &fill)
    }

    // ---- expressions ----

    /// Evaluate a full expression, starting with an empty place cache.
    fn eval_full(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.places.clear();
        self.eval(expr)
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        let range = &expr.range;
        match &expr.kind {
            ExprKind::Number(digits) => {
                let n = digits
                    .parse::<i64>()
                    .ok()
                    .filter(|n| i32::try_from(*n).is_ok())
                    .ok_or_else(|| {
                        semantic(
                            "integer literal too large to be represented by any integer type",
                            range,
                        )
                    })?;
                Ok(Value::integer_literal(n))
            }
            ExprKind::Char(code) => Ok(Value {
                ty: MusicType::Char,
                ..Value::integer_literal(i64::from(*code))
            }),
            ExprKind::Identifier(_) | ExprKind::Str(_) | ExprKind::Subscript { .. } => {
                let place = self.place(expr)?;
                self.read(&place, range)
            }
            ExprKind::Paren(inner) => self.eval(inner),
            ExprKind::Multi(items) => {
                let mut last = Value::generic(Payload::Unset);
                for item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let l = self.eval(left)?.payload.truthy();
                    let result = if (*op == BinaryOp::And) == l {
                        self.eval(right)?.payload.truthy()
                    } else {
                        l
                    };
                    Ok(Value::generic(Payload::Bool(result)))
                }
                _ => {
                    let l = self.eval(left)?;
                    let r = self.eval(right)?;
                    self.fold(*op, &l, &r, range)
                }
            },
            ExprKind::Assign { op, left, right } => self.assign(*op, left, right, range),
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand)?;
                let payload = value::unary(*op, &v.payload).map_err(|_| {
                    let symbol = match op {
                        UnaryOp::Plus => "+",
                        UnaryOp::Neg => "-",
                        UnaryOp::Compl => "~",
                    };
                    semantic(format!("invalid operand to unary '{symbol}'"), range)
                })?;
                Ok(constant_or_generic(&[&v], payload))
            }
            ExprKind::IncDec {
                op,
                prefix,
                operand,
            } => self.inc_dec(*op, *prefix, operand, range),
            ExprKind::Args(items) => {
                let mut payloads = Vec::with_capacity(items.len());
                for item in items {
                    payloads.push(self.eval(item)?.payload);
                }
                Ok(Value::list_literal(payloads))
            }
            ExprKind::Play(operand) => {
                let v = self.eval(operand)?;
                if let Err(e) = self.library.export(&v.payload) {
                    warn!(error = %e, "play failed");
                }
                Ok(v)
            }
            ExprKind::Score(operand) => {
                let v = self.eval(operand)?;
                if let Err(e) = self.library.render_score(&v.payload) {
                    warn!(error = %e, "score rendering failed");
                }
                Ok(v)
            }
        }
    }

    /// Apply a non-logical binary operator.
    fn fold(&mut self, op: BinaryOp, l: &Value, r: &Value, range: &Range) -> EvalResult<Value> {
        let music = l.payload.is_music() || r.payload.is_music();
        if music && !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let payload = self
                .library
                .operate(op, &l.payload, &r.payload)
                .map_err(|e| semantic(e.to_string(), range))?;
            return Ok(Value::generic(payload));
        }
        let payload = value::binary(op, &l.payload, &r.payload).map_err(|e| match e {
            OpError::InvalidOperands => semantic(format!("invalid operands to binary '{op}'"), range),
            other => semantic(other.to_string(), range),
        })?;
        Ok(constant_or_generic(&[l, r], payload))
    }

    fn assign(&mut self, op: AssignOp, left: &Expr, right: &Expr, range: &Range) -> EvalResult<Value> {
        let not_assignable = || {
            semantic(
                format!("expression on left of '{}' is not assignable", op.symbol()),
                &left.range,
            )
        };
        if !left.is_lvalue_capable() {
            // Surface resolution errors inside the left side first.
            self.eval(left)?;
            return Err(not_assignable());
        }
        let place = self.place(left)?;
        if self.place_type(&place).is_array() {
            return Err(not_assignable());
        }

        let rhs = self.eval(right)?;
        let value = match op {
            AssignOp::Assign => rhs,
            AssignOp::Compound(bin) => {
                let old = self.read(&place, &left.range)?;
                self.fold(bin, &old, &rhs, range)?
            }
        };
        self.store(&place, &value, range)?;
        self.read(&place, range)
    }

    fn inc_dec(&mut self, op: IncDec, prefix: bool, operand: &Expr, range: &Range) -> EvalResult<Value> {
        let name = match op {
            IncDec::Incr => "increment",
            IncDec::Decr => "decrement",
        };
        let not_modifiable =
            || semantic(format!("operand of {name} operator not a modifiable lvalue"), &operand.range);
        if !operand.is_lvalue_capable() {
            self.eval(operand)?;
            return Err(not_modifiable());
        }
        let place = self.place(operand)?;
        if self.place_type(&place).is_array() {
            return Err(not_modifiable());
        }

        let old = self.read(&place, &operand.range)?;
        let bin = match op {
            IncDec::Incr => BinaryOp::Add,
            IncDec::Decr => BinaryOp::Sub,
        };
        let new = self.fold(bin, &old, &Value::generic(Payload::Int(1)), range)?;
        self.store(&place, &new, range)?;
        if prefix {
            self.read(&place, range)
        } else {
            Ok(old)
        }
    }

    // ---- places ----

    /// Resolve an lvalue-capable expression to its storage.
    fn place(&mut self, expr: &Expr) -> EvalResult<Place> {
        if let Some(place) = self.places.get(&expr.id) {
            return Ok(place.clone());
        }
        let place = match &expr.kind {
            ExprKind::Identifier(name) => self
                .symbols
                .lookup(name)
                .map(Place::Slot)
                .map_err(|m| semantic(m, &expr.range))?,
            ExprKind::Str(chars) => Place::Slot(self.temp(expr, Value::string_literal(chars))),
            ExprKind::Paren(inner) => self.place(inner)?,
            ExprKind::Subscript { base, index } => {
                let base_place = if base.is_lvalue_capable() {
                    self.place(base)?
                } else {
                    let v = self.eval(base)?;
                    Place::Slot(self.temp(base, Value { literal: None, ..v }))
                };
                let i = self.eval(index)?.payload.as_int().ok_or_else(|| {
                    semantic(IndexError::NotInteger.to_string(), &index.range)
                })?;
                match base_place {
                    Place::Slot(slot) => Place::Element(slot, vec![i]),
                    Place::Element(slot, mut path) => {
                        path.push(i);
                        Place::Element(slot, path)
                    }
                }
            }
            _ => return Err(semantic("expression is not assignable", &expr.range)),
        };
        self.places.insert(expr.id, place.clone());
        Ok(place)
    }

    /// Load `value` into the scratch slot owned by `expr`.
    fn temp(&mut self, expr: &Expr, value: Value) -> SlotId {
        let slot = match self.temps.get(&expr.id) {
            Some(slot) => *slot,
            None => {
                let slot = self.symbols.alloc_temp(value.ty.clone());
                self.temps.insert(expr.id, slot);
                slot
            }
        };
        let temp = self.symbols.slot_mut(slot);
        temp.ty = value.ty;
        temp.literal = value.literal;
        temp.payload = value.payload;
        slot
    }

    fn place_type(&self, place: &Place) -> MusicType {
        match place {
            Place::Slot(slot) => self.symbols.slot(*slot).ty.clone(),
            Place::Element(slot, path) => {
                let mut ty = &self.symbols.slot(*slot).ty;
                for _ in path {
                    match ty.element() {
                        Some(el) => ty = el,
                        None => return MusicType::Generic,
                    }
                }
                ty.clone()
            }
        }
    }

    fn read(&self, place: &Place, range: &Range) -> EvalResult<Value> {
        match place {
            Place::Slot(slot) => {
                let slot = self.symbols.slot(*slot);
                Ok(Value {
                    ty: slot.ty.clone(),
                    literal: slot.literal,
                    payload: slot.payload.clone(),
                })
            }
            Place::Element(slot, path) => {
                let mut payload = self.symbols.slot(*slot).payload.clone();
                for i in path {
                    payload = payload.index(*i).map_err(|e| semantic(e.to_string(), range))?;
                }
                Ok(Value {
                    ty: self.place_type(place),
                    literal: None,
                    payload,
                })
            }
        }
    }

    /// Coerce `value` for the place's type and write it.
    fn store(&mut self, place: &Place, value: &Value, range: &Range) -> EvalResult<()> {
        let ty = self.place_type(place);
        let payload = self.coerce(&ty, value, range)?;
        match place {
            Place::Slot(slot) => {
                self.symbols.slot_mut(*slot).payload = payload;
            }
            Place::Element(slot, path) => {
                let mut target = &mut self.symbols.slot_mut(*slot).payload;
                for i in path {
                    target = target
                        .element_mut(*i)
                        .map_err(|e| semantic(e.to_string(), range))?;
                }
                *target = payload;
            }
        }
        Ok(())
    }

    /// Destination-directed conversion: pieces are always built by the
    /// library, notes and chords only from text or list literals.
    fn coerce(&mut self, dst: &MusicType, value: &Value, range: &Range) -> EvalResult<Payload> {
        let payload = match dst {
            MusicType::Piece => {
                let piece = self
                    .library
                    .piece(&value.payload)
                    .map_err(|e| semantic(e.to_string(), range))?;
                for detail in self.library.track_details(&piece) {
                    info!("{detail}");
                }
                Payload::Music(piece)
            }
            MusicType::Note | MusicType::Chord if value.literal.is_some() => match &value.payload {
                Payload::List(_) | Payload::Text(_) => {
                    let built = if *dst == MusicType::Note {
                        self.library.note(&value.payload)
                    } else {
                        self.library.chord(&value.payload)
                    };
                    Payload::Music(built.map_err(|e| semantic(e.to_string(), range))?)
                }
                other => other.clone(),
            },
            _ => value.payload.clone(),
        };
        Ok(payload)
    }
}

/// Base type named by a declaration's specifiers.
fn specs_type(specs: &[Token]) -> EvalResult<MusicType> {
    let mut names: Vec<&str> = specs
        .iter()
        .filter(|t| t.kind.is_type_specifier())
        .map(|t| t.kind.text())
        .collect();
    names.sort_unstable();
    let ty = match names.as_slice() {
        ["note"] => MusicType::Note,
        ["chord"] => MusicType::Chord,
        ["piece"] => MusicType::Piece,
        ["setting"] => MusicType::Setting,
        _ => {
            let range = match (specs.first(), specs.last()) {
                (Some(first), Some(last)) => Some(&first.range + &last.range),
                _ => None,
            };
            return Err(CompileError::semantic(
                "unrecognized set of type specifiers",
                range,
            ));
        }
    };
    Ok(ty)
}

/// Folding two integer constants yields an integer constant; anything else
/// is a generic runtime value.
fn constant_or_generic(operands: &[&Value], payload: Payload) -> Value {
    let constant = operands
        .iter()
        .all(|v| v.ty.is_integral() && v.literal == Some(LiteralKind::Integer));
    match payload {
        Payload::Int(n) if constant => Value::integer_literal(n),
        other => Value::generic(other),
    }
}

fn element_count(ty: &MusicType) -> usize {
    match ty {
        MusicType::Array(el, n) => n.unwrap_or(0).saturating_mul(element_count(el).max(1)),
        _ => 1,
    }
}

/// Lists nested to the shape of `ty`, with `fill` at the leaves.
fn shape(ty: &MusicType, fill: &Payload) -> Payload {
    match ty {
        MusicType::Array(el, n) => {
            Payload::List((0..n.unwrap_or(0)).map(|_| shape(el, fill)).collect())
        }
        _ => fill.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::lexer::tokenize;
    use crate::dsl::parser::parse;
    use crate::music::{MusicError, MusicObject, Note};

    #[derive(Default)]
    struct Recorder {
        exported: Vec<Payload>,
        scored: Vec<Payload>,
    }

    impl MusicLibrary for Recorder {
        fn export(&mut self, value: &Payload) -> Result<(), MusicError> {
            self.exported.push(value.clone());
            Ok(())
        }

        fn render_score(&mut self, value: &Payload) -> Result<(), MusicError> {
            self.scored.push(value.clone());
            Ok(())
        }
    }

    struct Run {
        symbols: SymbolTable,
        errors: Vec<String>,
        library: Recorder,
    }

    impl Run {
        fn value(&self, name: &str) -> Payload {
            let slot = self.symbols.lookup(name).expect("declared");
            self.symbols.slot(slot).payload.clone()
        }

        fn state(&self, name: &str) -> Option<DefState> {
            self.symbols.def_state(self.symbols.lookup(name).ok()?)
        }
    }

    fn run_with(source: &str, options: EvalOptions) -> Run {
        let mut errors = ErrorCollector::new();
        let tokens = tokenize(source, "test.mc", &mut errors);
        let program = parse(&tokens, &mut errors).expect("parses");
        let mut library = Recorder::default();
        let symbols = {
            let mut evaluator = Evaluator::new(&mut library, options);
            evaluator.run(&program, &mut errors);
            evaluator.into_symbols()
        };
        Run {
            symbols,
            errors: errors.issues().iter().map(|e| e.message.clone()).collect(),
            library,
        }
    }

    fn run(source: &str) -> Run {
        run_with(source, EvalOptions::default())
    }

    fn errors_of(source: &str) -> Vec<String> {
        run(source).errors
    }

    #[test]
    fn end_to_end_integer_folding() {
        let r = run("note a = 5; note b = a + 1;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("a"), Payload::Int(5));
        assert_eq!(r.value("b"), Payload::Int(6));
    }

    #[test]
    fn precedence() {
        let r = run("note a = 2 + 3 * 4; note b = (2 + 3) * 4;");
        assert_eq!(r.value("a"), Payload::Int(14));
        assert_eq!(r.value("b"), Payload::Int(20));
    }

    #[test]
    fn block_scoping() {
        let errors = errors_of("{ note inner = 1; } note x = inner;");
        assert_eq!(errors, vec!["use of undeclared identifier 'inner'"]);
    }

    #[test]
    fn shadowing_restores_outer() {
        let r = run("note a = 1; { note a = 2; a = 3; } note b = a;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("b"), Payload::Int(1));
    }

    #[test]
    fn definition_state_is_monotonic() {
        let r = run("note a; note a;");
        assert_eq!(r.state("a"), Some(DefState::Tentative));
        let r = run("note a = 1; note a;");
        assert_eq!(r.state("a"), Some(DefState::Defined));
        let r = run("note a; note a = 1; note a;");
        assert_eq!(r.state("a"), Some(DefState::Defined));
    }

    #[test]
    fn assignability() {
        assert_eq!(
            errors_of("5 = 3;"),
            vec!["expression on left of '=' is not assignable"]
        );
        assert_eq!(
            errors_of("a += 1;"),
            vec!["use of undeclared identifier 'a'"]
        );
        assert_eq!(
            errors_of("b + 1 = 2;"),
            vec!["use of undeclared identifier 'b'"]
        );
        assert_eq!(
            errors_of("note arr[2]; arr = 1;"),
            vec!["expression on left of '=' is not assignable"]
        );
    }

    #[test]
    fn compound_assignment_and_increments() {
        let r = run("note a = 10; a -= 3; note b = a++; note c = ++a; note d = a--;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("a"), Payload::Int(8));
        assert_eq!(r.value("b"), Payload::Int(7));
        assert_eq!(r.value("c"), Payload::Int(9));
        assert_eq!(r.value("d"), Payload::Int(9));
        assert_eq!(
            errors_of("3++;"),
            vec!["operand of increment operator not a modifiable lvalue"]
        );
        assert_eq!(
            errors_of("--(1 + 2);"),
            vec!["operand of decrement operator not a modifiable lvalue"]
        );
    }

    #[test]
    fn array_sizes() {
        assert_eq!(errors_of("note a[0];"), vec!["array size must be positive"]);
        assert_eq!(errors_of("note a[-1];"), vec!["array size must be positive"]);
        assert_eq!(
            errors_of("note x = 3; note a[x];"),
            vec!["array size must have integral type"]
        );
        assert_eq!(
            errors_of("note a[\"abc\"[1]];"),
            vec!["array size must be compile-time constant"]
        );
        assert!(errors_of("note a[3];").is_empty());
        assert!(errors_of("note a[2 * 2 + 'a'];").is_empty());
    }

    #[test]
    fn array_defaults_follow_policy() {
        let r = run("note a[2]; chord g[2][3];");
        let Payload::List(items) = r.value("a") else {
            panic!("expected list");
        };
        assert_eq!(items, vec![Payload::Music(MusicObject::Note(Note::default())); 2]);
        let Payload::List(rows) = r.value("g") else {
            panic!("expected list");
        };
        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], Payload::List(cols) if cols.len() == 3));

        let options = EvalOptions {
            populate_array_defaults: false,
            ..EvalOptions::default()
        };
        let r = run_with("note a[2];", options);
        assert_eq!(r.value("a"), Payload::List(vec![Payload::Unset; 2]));
    }

    #[test]
    fn element_assignment_and_indexing() {
        let r = run("note a[3]; a[1] = \"E4\"; note b = a[1]; note c = a[-1];");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("b").to_string(), "E4");
        assert_eq!(r.value("c").to_string(), "C4");
        assert_eq!(
            errors_of("note a[2]; a[5] = 1;"),
            vec!["array index out of range"]
        );
        assert_eq!(
            errors_of("note a = 1; note b = a[0];"),
            vec!["subscripted value is not an array"]
        );
    }

    #[test]
    fn per_declarator_errors() {
        let r = run("note a = x, b = 2, = 3;");
        assert_eq!(
            r.errors,
            vec![
                "use of undeclared identifier 'x'",
                "missing identifier name in declaration",
            ]
        );
        assert_eq!(r.value("b"), Payload::Int(2));
    }

    #[test]
    fn specifier_sets() {
        assert_eq!(
            errors_of("note chord x;"),
            vec!["unrecognized set of type specifiers"]
        );
        assert!(errors_of("setting s = 4;").is_empty());
    }

    #[test]
    fn literal_checks() {
        assert_eq!(
            errors_of("note a = 3000000000;"),
            vec!["integer literal too large to be represented by any integer type"]
        );
        let r = run("note a = 'A';");
        assert_eq!(r.value("a"), Payload::Int(65));
    }

    #[test]
    fn text_and_lists_become_music() {
        let r = run("note n = \"G4\"; chord c = \"Am\"; chord m = {\"C\", \"E\", \"G\"};");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("n").to_string(), "G4");
        assert_eq!(r.value("c").to_string(), "{A4, C5, E5}");
        let Payload::Music(MusicObject::Chord(m)) = r.value("m") else {
            panic!("expected chord");
        };
        assert_eq!(m.onsets, vec![0.0, 0.25, 0.5]);
        assert_eq!(errors_of("note n = \"Q\";"), vec!["invalid note: unknown note name 'Q'"]);
    }

    #[test]
    fn music_operators_are_forwarded() {
        let r = run("note c = \"C4\"; note d = c + 2; chord both = c @ d; chord run = c * 3;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("d").to_string(), "D4");
        assert_eq!(r.value("both").to_string(), "{C4, D4}");
        let Payload::Music(MusicObject::Chord(run)) = r.value("run") else {
            panic!("expected chord");
        };
        assert_eq!(run.notes.len(), 3);
        assert_eq!(
            errors_of("note a = 1 @ 2;"),
            vec!["invalid operands to binary '@'"]
        );
    }

    #[test]
    fn pieces_are_built() {
        let r = run("piece p = {{\"C\", \"Am\"}, {1, 25}, 100};");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        let Payload::Music(MusicObject::Piece(p)) = r.value("p") else {
            panic!("expected piece");
        };
        assert_eq!(p.tracks.len(), 2);
        assert_eq!(p.programs, vec![0, 24]);
        assert_eq!(p.bpm, 100.0);
    }

    #[test]
    fn play_and_score_are_side_effects() {
        let r = run("chord c = \"C\"; play c; score c + 12; note x = play 5;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.library.exported.len(), 2);
        assert_eq!(r.library.scored.len(), 1);
        assert_eq!(r.value("x"), Payload::Int(5));
    }

    #[test]
    fn control_flow() {
        let r = run(
            "note i = 0; note total = 0;
             while (i < 10) {
                 i++;
                 if (i % 2 == 0) continue;
                 if (i > 7) break;
                 total += i;
             }",
        );
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("total"), Payload::Int(1 + 3 + 5 + 7));
        assert_eq!(r.value("i"), Payload::Int(9));
    }

    #[test]
    fn break_outside_loop() {
        assert_eq!(errors_of("break;"), vec!["break statement not in loop"]);
        assert_eq!(
            errors_of("{ continue; }"),
            vec!["continue statement not in loop"]
        );
    }

    #[test]
    fn runaway_loop_is_reported() {
        let options = EvalOptions {
            max_loop_iterations: 50,
            ..EvalOptions::default()
        };
        let r = run_with("note n = 0; while (1) n++;", options);
        assert_eq!(r.errors, vec!["loop did not terminate within 50 iterations"]);
        assert_eq!(r.value("n"), Payload::Int(50));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let r = run("note a = 0 && missing; note b = 1 || missing; note c = 1 && 2;");
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("a"), Payload::Bool(false));
        assert_eq!(r.value("b"), Payload::Bool(true));
        assert_eq!(r.value("c"), Payload::Bool(true));
    }

    #[test]
    fn dot_and_division() {
        let r = run("note a = 1.5; note b = 7 / 2;");
        assert_eq!(r.value("a"), Payload::Float(1.5));
        assert_eq!(r.value("b"), Payload::Float(3.5));
        assert_eq!(errors_of("note z = 1 / 0;"), vec!["division by zero"]);
    }

    #[test]
    fn comma_yields_last() {
        let r = run("note a = 0; note b = (a = 4, a + 1);");
        assert_eq!(r.value("b"), Payload::Int(5));
    }

    #[test]
    fn loop_body_errors_reported_once() {
        let r = run("note i = 0; while (i < 3) { i++; oops; }");
        assert_eq!(r.errors, vec!["use of undeclared identifier 'oops'"]);
    }

    #[test]
    fn loops_reuse_scratch_slots() {
        let r = run(
            "note i = 0; note t;
             while (i < 50) { t = \"abc\"[1]; t = {7, 8}[1]; i++; }",
        );
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.value("t"), Payload::Int(8));
        // i, t and one scratch slot per literal.
        assert_eq!(r.symbols.slot_count(), 4);
    }

    #[test]
    fn context_builders() {
        let ctx = Context::global().with_loop(true).with_global(false);
        assert!(ctx.in_loop);
        assert!(!ctx.is_global);
    }
}
