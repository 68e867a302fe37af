//! The single-pass compiler.
//!
//! A Pratt parser that emits bytecode directly while it reads tokens; there
//! is no syntax tree. A stack of per-function contexts tracks locals, scope
//! depths, and upvalue captures; forward jumps are emitted with placeholder
//! operands and patched once their target is known.

pub mod error;

use crate::error::{CompileError, CompileErrorKind};
use compact_str::CompactString;
use flint_lexer::Lexer;
use flint_lexer::token::{Token, TokenKind};
use flint_runtime::chunk::Chunk;
use flint_runtime::heap::{Handle, Heap, MarkRoots, Object};
use flint_runtime::object::{Function, UpvalueDesc};
use flint_runtime::opcode::{OpCode, is_jump_opcode};
use flint_runtime::value::Value;
use flint_span::Span;

/// At most 256 locals per function; slot indices are single bytes.
const MAX_LOCALS: usize = 256;
/// At most 256 captured variables per function.
const MAX_UPVALUES: usize = 256;
/// At most 255 parameters and call arguments.
const MAX_ARITY: usize = 255;

/// The placeholder operand emitted for a jump before its target is known.
const JUMP_PLACEHOLDER: i16 = 0x7fff;

/// Operator precedence, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// The next-higher precedence, for parsing the right operand of a
    /// left-associative binary operator.
    const fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

/// What kind of function body a context is compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    /// The implicit function wrapping top-level code.
    Toplevel,
    /// A `fun` declaration.
    Function,
    /// A class method.
    Method,
    /// A class `init` method.
    Initializer,
}

/// A local variable slot.
#[derive(Debug)]
struct Local {
    name: CompactString,
    /// The scope depth the local was declared at; `None` until its
    /// initializer has finished, so reading it in there is detectable.
    depth: Option<usize>,
    /// Whether any nested function captures this local.
    is_captured: bool,
}

/// One per function being compiled; the parser keeps a stack of these.
#[derive(Debug)]
struct FnContext {
    /// The function under construction, already on the heap so the
    /// collector can reach its constants mid-compile.
    function: Handle<Function>,
    kind: FunctionKind,
    locals: Vec<Local>,
    depth: usize,
}

type ParseFn<'src, 'ctx> = fn(&mut Parser<'src, 'ctx>, bool);

/// One row of the Pratt dispatch table.
#[derive(Clone, Copy)]
struct ParseRule<'src, 'ctx> {
    prefix: Option<ParseFn<'src, 'ctx>>,
    infix: Option<ParseFn<'src, 'ctx>>,
    precedence: Precedence,
}

/// The rule for a token kind: its prefix handler, infix handler, and infix
/// precedence.
fn rule<'src, 'ctx>(kind: TokenKind) -> ParseRule<'src, 'ctx> {
    match kind {
        TokenKind::LeftParenthesis => ParseRule {
            prefix: Some(Parser::grouping),
            infix: Some(Parser::call),
            precedence: Precedence::Call,
        },
        TokenKind::Dot => ParseRule {
            prefix: None,
            infix: Some(Parser::dot),
            precedence: Precedence::Call,
        },
        TokenKind::Minus => ParseRule {
            prefix: Some(Parser::unary),
            infix: Some(Parser::binary),
            precedence: Precedence::Term,
        },
        TokenKind::Plus => ParseRule {
            prefix: None,
            infix: Some(Parser::binary),
            precedence: Precedence::Term,
        },
        TokenKind::Slash | TokenKind::Star => ParseRule {
            prefix: None,
            infix: Some(Parser::binary),
            precedence: Precedence::Factor,
        },
        TokenKind::Bang => ParseRule {
            prefix: Some(Parser::unary),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::BangEqual | TokenKind::EqualEqual => ParseRule {
            prefix: None,
            infix: Some(Parser::binary),
            precedence: Precedence::Equality,
        },
        TokenKind::LessThan
        | TokenKind::LessThanEqual
        | TokenKind::GreaterThan
        | TokenKind::GreaterThanEqual => ParseRule {
            prefix: None,
            infix: Some(Parser::binary),
            precedence: Precedence::Comparison,
        },
        TokenKind::NumericLiteral => ParseRule {
            prefix: Some(Parser::number),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::StringLiteral => ParseRule {
            prefix: Some(Parser::string),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::Ident => ParseRule {
            prefix: Some(Parser::variable),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::KeywordAnd => ParseRule {
            prefix: None,
            infix: Some(Parser::and_operator),
            precedence: Precedence::And,
        },
        TokenKind::KeywordOr => ParseRule {
            prefix: None,
            infix: Some(Parser::or_operator),
            precedence: Precedence::Or,
        },
        TokenKind::KeywordTrue | TokenKind::KeywordFalse | TokenKind::KeywordNil => ParseRule {
            prefix: Some(Parser::literal),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::KeywordThis => ParseRule {
            prefix: Some(Parser::this),
            infix: None,
            precedence: Precedence::None,
        },
        _ => ParseRule {
            prefix: None,
            infix: None,
            precedence: Precedence::None,
        },
    }
}

/// The single-pass parser and code generator.
struct Parser<'src, 'ctx> {
    lexer: Lexer<'src>,
    source: &'src str,
    heap: &'ctx mut Heap,
    /// Extra roots to keep alive across collections triggered mid-compile,
    /// e.g. a REPL's virtual machine state.
    host_roots: Option<&'ctx dyn MarkRoots>,
    current: Token,
    previous: Token,
    contexts: Vec<FnContext>,
    /// Depth of nested class bodies; gates `this`.
    class_depth: usize,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    fn new(
        source: &'src str,
        heap: &'ctx mut Heap,
        host_roots: Option<&'ctx dyn MarkRoots>,
    ) -> Self {
        Self {
            lexer: Lexer::new(source),
            source,
            heap,
            host_roots,
            current: Token::eof(0, 1),
            previous: Token::eof(0, 1),
            contexts: Vec::new(),
            class_depth: 0,
            errors: Vec::new(),
            panic_mode: false,
        }
    }

    fn run(mut self) -> Result<Handle<Function>, Vec<CompileError>> {
        self.begin_context("script", FunctionKind::Toplevel);
        self.advance();
        while !self.current.is_eof() {
            self.declaration();
        }
        let script = self.end_context();
        if self.errors.is_empty() {
            Ok(script)
        } else {
            Err(self.errors)
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing.
    // ------------------------------------------------------------------

    fn lexeme(&self, span: Span) -> &'src str {
        &self.source[span.range()]
    }

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.lexer.next_token();
            let Some(message) = self.current.kind.error_message() else {
                break;
            };
            self.error_at_current(CompileErrorKind::Scanner { message });
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance_if(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, what: &'static str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(CompileErrorKind::Expected { what });
        }
    }

    // ------------------------------------------------------------------
    // Error bookkeeping.
    // ------------------------------------------------------------------

    fn error_at(&mut self, token: Token, kind: CompileErrorKind) {
        // Panic mode suppresses the cascade after the first error; the parser
        // resynchronizes at the next statement boundary.
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompileError {
            kind,
            line: token.line,
            span: token.span,
        });
    }

    fn error(&mut self, kind: CompileErrorKind) {
        self.error_at(self.previous, kind);
    }

    fn error_at_current(&mut self, kind: CompileErrorKind) {
        self.error_at(self.current, kind);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.current.is_eof() {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::KeywordClass
                | TokenKind::KeywordFun
                | TokenKind::KeywordVar
                | TokenKind::KeywordFor
                | TokenKind::KeywordIf
                | TokenKind::KeywordWhile
                | TokenKind::KeywordPrint
                | TokenKind::KeywordReturn => return,
                _ => self.advance(),
            }
        }
    }

    // ------------------------------------------------------------------
    // Contexts and scopes.
    // ------------------------------------------------------------------

    fn begin_context(&mut self, name: &str, kind: FunctionKind) {
        let name = self.heap.intern(name);
        let function = self.heap.make_function(Function {
            name,
            arity: 0,
            upvalues: Vec::new(),
            chunk: Chunk::new(),
        });
        // Slot 0 is reserved: the callee in functions, the receiver in
        // methods. The name keeps user code from resolving it except as
        // `this` inside a class body.
        let reserved = match kind {
            FunctionKind::Method | FunctionKind::Initializer => CompactString::const_new("this"),
            FunctionKind::Toplevel | FunctionKind::Function => CompactString::const_new(""),
        };
        self.contexts.push(FnContext {
            function,
            kind,
            locals: vec![Local {
                name: reserved,
                depth: Some(0),
                is_captured: false,
            }],
            depth: 0,
        });
    }

    /// Seal the current function with its automatic return and pop the
    /// context.
    fn end_context(&mut self) -> Handle<Function> {
        self.emit_auto_return_value();
        self.emit(OpCode::Return);
        let context = self
            .contexts
            .pop()
            .expect("popping a context we pushed on.");
        context.function
    }

    fn context(&self) -> &FnContext {
        self.contexts.last().expect("context stack is never empty.")
    }

    fn context_mut(&mut self) -> &mut FnContext {
        self.contexts
            .last_mut()
            .expect("context stack is never empty.")
    }

    fn begin_scope(&mut self) {
        self.context_mut().depth += 1;
    }

    fn end_scope(&mut self) {
        let pops: Vec<bool> = {
            let context = self.context_mut();
            context.depth -= 1;
            let depth = context.depth;
            let mut pops = Vec::new();
            while let Some(local) = context.locals.last() {
                if local.depth.is_none_or(|local_depth| local_depth > depth) {
                    pops.push(local.is_captured);
                    context.locals.pop();
                } else {
                    break;
                }
            }
            pops
        };
        for is_captured in pops {
            if is_captured {
                self.emit(OpCode::CloseUpvalue);
            } else {
                self.emit(OpCode::Pop);
            }
        }
    }

    // ------------------------------------------------------------------
    // Emission.
    // ------------------------------------------------------------------

    fn chunk_mut(&mut self) -> &mut Chunk {
        let function = self.context().function;
        &mut self
            .heap
            .function_mut(function)
            .expect("compiler context functions are rooted.")
            .chunk
    }

    fn current_offset(&self) -> usize {
        let function = self.context().function;
        self.heap
            .function(function)
            .expect("compiler context functions are rooted.")
            .chunk
            .len()
    }

    fn emit(&mut self, opcode: OpCode) {
        let line = self.previous.line;
        opcode.encode(self.chunk_mut(), line);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk_mut().add_constant(value) {
            Some(index) => index,
            None => {
                self.error(CompileErrorKind::TooManyConstants);
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit(OpCode::Constant(index));
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let handle = self.heap.intern(name);
        self.make_constant(Value::String(handle))
    }

    /// Emit a jump with a placeholder operand and return the offset of the
    /// operand's first byte.
    fn emit_jump(&mut self, jump: fn(i16) -> OpCode) -> usize {
        self.emit(jump(JUMP_PLACEHOLDER));
        self.current_offset() - 2
    }

    /// Patch the jump whose operand starts at `placeholder` to land on
    /// `target`.
    fn patch_jump_to(&mut self, placeholder: usize, target: usize) {
        // The operand is relative to the byte just after itself.
        let jump = target as isize - placeholder as isize - 2;
        let Ok(jump) = i16::try_from(jump) else {
            self.error(CompileErrorKind::JumpTooFar);
            return;
        };
        let [high, low] = jump.to_be_bytes();
        let chunk = self.chunk_mut();
        debug_assert!(
            is_jump_opcode(chunk.code()[placeholder - 1]),
            "patch target is not a jump instruction."
        );
        chunk.patch_u8(placeholder, high);
        chunk.patch_u8(placeholder + 1, low);
    }

    fn patch_jump(&mut self, placeholder: usize) {
        self.patch_jump_to(placeholder, self.current_offset());
    }

    /// Push the implicit return value: the receiver in an initializer, nil
    /// everywhere else.
    fn emit_auto_return_value(&mut self) {
        if self.context().kind == FunctionKind::Initializer {
            self.emit(OpCode::GetLocal(0));
        } else {
            self.emit(OpCode::Nil);
        }
    }

    // ------------------------------------------------------------------
    // Variable resolution.
    // ------------------------------------------------------------------

    fn declare_local(&mut self, name: &str) {
        if self.context().locals.len() >= MAX_LOCALS {
            self.error(CompileErrorKind::TooManyLocals);
            return;
        }
        let duplicate = {
            let context = self.context();
            let depth = context.depth;
            // Locals from enclosing scopes always sit below the current
            // scope's, so the depth check doubles as the scan cutoff.
            context.locals.iter().rev().any(|local| {
                if local.depth.is_some_and(|local_depth| local_depth < depth) {
                    return false;
                }
                local.name == name
            })
        };
        if duplicate {
            self.error(CompileErrorKind::DuplicateLocal {
                name: CompactString::from(name),
            });
            return;
        }
        self.context_mut().locals.push(Local {
            name: CompactString::from(name),
            depth: None,
            is_captured: false,
        });
    }

    /// Give the most recent local its scope depth, making it resolvable.
    fn mark_initialized(&mut self) {
        let context = self.context_mut();
        if context.depth == 0 {
            return;
        }
        let depth = context.depth;
        if let Some(local) = context.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    /// Resolve a name against the locals of the given context, innermost
    /// slot first. Returns the slot and whether the local is initialized.
    fn resolve_local_at(&self, context_index: usize, name: &str) -> Option<(u8, bool)> {
        let context = &self.contexts[context_index];
        for (slot, local) in context.locals.iter().enumerate().rev() {
            if local.name == name {
                let slot = u8::try_from(slot).expect("local count is capped at 256.");
                return Some((slot, local.depth.is_some()));
            }
        }
        None
    }

    /// Resolve a name as an upvalue of the given context, walking enclosing
    /// contexts outward and chaining descriptors back in.
    fn resolve_upvalue(&mut self, context_index: usize, name: &str) -> Option<u8> {
        if context_index == 0 {
            return None;
        }
        let parent = context_index - 1;

        if let Some((slot, _)) = self.resolve_local_at(parent, name) {
            self.contexts[parent].locals[usize::from(slot)].is_captured = true;
            return Some(self.add_upvalue(context_index, slot, true));
        }

        if let Some(index) = self.resolve_upvalue(parent, name) {
            return Some(self.add_upvalue(context_index, index, false));
        }

        None
    }

    /// Append an upvalue descriptor, deduplicating by `(index, is_local)`.
    fn add_upvalue(&mut self, context_index: usize, index: u8, is_local: bool) -> u8 {
        let function = self.contexts[context_index].function;
        let overflow = {
            let function = self
                .heap
                .function_mut(function)
                .expect("compiler context functions are rooted.");
            if let Some(existing) = function
                .upvalues
                .iter()
                .position(|upvalue| upvalue.index == index && upvalue.is_local == is_local)
            {
                return u8::try_from(existing).expect("upvalue count is capped at 256.");
            }
            if function.upvalues.len() >= MAX_UPVALUES {
                true
            } else {
                function.upvalues.push(UpvalueDesc { index, is_local });
                return u8::try_from(function.upvalues.len() - 1)
                    .expect("upvalue count is capped at 256.");
            }
        };
        if overflow {
            self.error(CompileErrorKind::TooManyUpvalues);
        }
        0
    }

    /// Compile a read of or assignment to a named variable, resolving it as
    /// a local, an upvalue, or a global, in that order.
    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let top = self.contexts.len() - 1;
        let (get, set) = if let Some((slot, initialized)) = self.resolve_local_at(top, name) {
            if !initialized {
                self.error(CompileErrorKind::ReadInOwnInitializer {
                    name: CompactString::from(name),
                });
            }
            (OpCode::GetLocal(slot), OpCode::SetLocal(slot))
        } else if let Some(index) = self.resolve_upvalue(top, name) {
            (OpCode::GetUpvalue(index), OpCode::SetUpvalue(index))
        } else {
            // Unknown names are globals; whether they are defined is a
            // runtime question because the definition may come later.
            let index = self.identifier_constant(name);
            (OpCode::GetGlobal(index), OpCode::SetGlobal(index))
        };

        if can_assign && self.advance_if(TokenKind::Equal) {
            self.expression();
            self.emit(set);
        } else {
            self.emit(get);
        }
    }

    /// Bind the name of a just-initialized variable: as a local at depth > 0,
    /// as a global binding instruction otherwise.
    fn define_variable(&mut self, name: &str) {
        if self.context().depth > 0 {
            self.declare_local(name);
            self.mark_initialized();
        } else {
            let index = self.identifier_constant(name);
            self.emit(OpCode::DefineGlobal(index));
        }
    }

    // ------------------------------------------------------------------
    // Declarations and statements.
    // ------------------------------------------------------------------

    fn declaration(&mut self) {
        if self.advance_if(TokenKind::KeywordVar) {
            self.var_declaration();
        } else if self.advance_if(TokenKind::KeywordFun) {
            self.function(false);
        } else if self.advance_if(TokenKind::KeywordClass) {
            self.class_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
        self.maybe_collect();
    }

    fn statement(&mut self) {
        if self.advance_if(TokenKind::KeywordPrint) {
            self.print_statement();
        } else if self.advance_if(TokenKind::KeywordIf) {
            self.if_statement();
        } else if self.advance_if(TokenKind::KeywordWhile) {
            self.while_statement();
        } else if self.advance_if(TokenKind::KeywordFor) {
            self.for_statement();
        } else if self.advance_if(TokenKind::KeywordReturn) {
            self.return_statement();
        } else if self.advance_if(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenKind::Ident, "expected variable name");
        let name = self.lexeme(self.previous.span);

        // Declare before the initializer so reading the variable inside it
        // resolves to the uninitialized slot and errors.
        if self.context().depth > 0 {
            self.declare_local(name);
        }

        if self.advance_if(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit(OpCode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "expected ';' after variable declaration",
        );

        if self.context().depth > 0 {
            self.mark_initialized();
        } else {
            let index = self.identifier_constant(name);
            self.emit(OpCode::DefineGlobal(index));
        }
    }

    fn function(&mut self, is_class_method: bool) {
        self.consume(TokenKind::Ident, "expected function name");
        let name: &'src str = self.lexeme(self.previous.span);
        let kind = if is_class_method {
            if name == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            }
        } else {
            FunctionKind::Function
        };

        self.begin_context(name, kind);
        self.begin_scope();

        self.consume(
            TokenKind::LeftParenthesis,
            "expected '(' after function name",
        );
        let mut arity: usize = 0;
        if !self.advance_if(TokenKind::RightParenthesis) {
            loop {
                arity += 1;
                if arity > MAX_ARITY {
                    self.error(CompileErrorKind::TooManyParameters);
                }
                self.consume(TokenKind::Ident, "expected parameter name");
                let parameter = self.lexeme(self.previous.span);
                self.declare_local(parameter);
                self.mark_initialized();
                if self.advance_if(TokenKind::Comma) {
                    continue;
                }
                if self.advance_if(TokenKind::RightParenthesis) {
                    break;
                }
                self.error_at_current(CompileErrorKind::Expected {
                    what: "expected ',' or ')' after parameter",
                });
                break;
            }
        }
        {
            let function = self.context().function;
            self.heap
                .function_mut(function)
                .expect("compiler context functions are rooted.")
                .arity = u8::try_from(arity.min(MAX_ARITY)).expect("arity is capped at 255.");
        }

        self.consume(TokenKind::LeftBrace, "expected '{' before function body");
        self.block();
        let function = self.end_context();

        // Wrap the finished function in a closure, serializing its capture
        // descriptors inline after the instruction.
        let descriptors = self
            .heap
            .function(function)
            .expect("just finished this function.")
            .upvalues
            .clone();
        let index = self.make_constant(Value::Function(function));
        self.emit(OpCode::Closure(index));
        let line = self.previous.line;
        let chunk = self.chunk_mut();
        for descriptor in descriptors {
            chunk.write_u8(u8::from(descriptor.is_local), line);
            chunk.write_u8(descriptor.index, line);
        }

        // Methods are not variables; the class body installs them into the
        // method table instead.
        if !is_class_method {
            self.define_variable(name);
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Ident, "expected class name");
        let name = CompactString::from(self.lexeme(self.previous.span));

        let name_index = self.identifier_constant(&name);
        self.emit(OpCode::Class(name_index));

        self.class_depth += 1;

        // Bind the name, then put the class back on top of the stack so
        // method installation finds it below each closure.
        if self.context().depth > 0 {
            self.declare_local(&name);
            self.mark_initialized();
        } else {
            self.emit(OpCode::DefineGlobal(name_index));
        }
        self.named_variable(&name, false);

        self.consume(TokenKind::LeftBrace, "expected '{' before class body");
        while !self.check(TokenKind::RightBrace) && !self.current.is_eof() {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "expected '}' after class body");
        self.emit(OpCode::Pop);

        self.class_depth -= 1;
    }

    fn method(&mut self) {
        // The closure ends up on top of the stack; the class sits below it.
        // The VM reads the method name out of the closure itself.
        self.function(true);
        self.emit(OpCode::DefineMethod);
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(
            TokenKind::Semicolon,
            "expected ';' after value in print statement",
        );
        self.emit(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "expected ';' after expression");
        self.emit(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.current.is_eof() {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "expected '}' after block");
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParenthesis, "expected '(' after 'if'");
        self.expression();
        self.consume(TokenKind::RightParenthesis, "expected ')' after condition");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        // Condition was truthy: discard it and run the then branch.
        self.emit(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        // Condition was falsy: discard it before the else branch.
        self.emit(OpCode::Pop);
        if self.advance_if(TokenKind::KeywordElse) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        self.consume(TokenKind::LeftParenthesis, "expected '(' after 'while'");
        let loop_start = self.current_offset();
        self.expression();
        self.consume(
            TokenKind::RightParenthesis,
            "expected ')' after while condition",
        );

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.statement();
        let loop_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump_to(loop_jump, loop_start);

        self.patch_jump(exit_jump);
        self.emit(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.consume(TokenKind::LeftParenthesis, "expected '(' after 'for'");
        self.begin_scope();

        // Initializer; every arm eats the closing semicolon.
        if self.advance_if(TokenKind::Semicolon) {
            // No initializer.
        } else if self.advance_if(TokenKind::KeywordVar) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let condition_start = self.current_offset();
        let has_condition = !self.advance_if(TokenKind::Semicolon);
        let exit_jump = if has_condition {
            self.expression();
            self.consume(TokenKind::Semicolon, "expected ';' after loop condition");
            Some(self.emit_jump(OpCode::JumpIfFalse))
        } else {
            None
        };

        // The increment textually precedes the body but runs after it, so
        // jump over it into the body and loop back through it.
        let body_jump = self.emit_jump(OpCode::Jump);
        let increment_start = self.current_offset();
        if !self.advance_if(TokenKind::RightParenthesis) {
            self.expression();
            self.consume(TokenKind::RightParenthesis, "expected ')' after for clauses");
            self.emit(OpCode::Pop);
        }
        if has_condition {
            let condition_jump = self.emit_jump(OpCode::Jump);
            self.patch_jump_to(condition_jump, condition_start);
        }

        self.patch_jump(body_jump);
        if has_condition {
            self.emit(OpCode::Pop);
        }
        self.statement();
        let increment_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump_to(increment_jump, increment_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.context().kind == FunctionKind::Toplevel {
            self.error(CompileErrorKind::ReturnAtTopLevel);
        }
        if self.advance_if(TokenKind::Semicolon) {
            self.emit_auto_return_value();
        } else {
            if self.context().kind == FunctionKind::Initializer {
                self.error(CompileErrorKind::ReturnValueFromInitializer);
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "expected ';' after return value");
        }
        self.emit(OpCode::Return);
    }

    // ------------------------------------------------------------------
    // Expressions.
    // ------------------------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule(self.previous.kind).prefix else {
            self.error(CompileErrorKind::ExpectedExpression);
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while rule(self.current.kind).precedence >= precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        // A leftover `=` means the prefix handler was not an assignable
        // target, or the precedence forbade assignment.
        if can_assign && self.advance_if(TokenKind::Equal) {
            self.error(CompileErrorKind::InvalidAssignmentTarget);
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParenthesis, "expected ')' after expression");
    }

    fn number(&mut self, _can_assign: bool) {
        let lexeme = self.lexeme(self.previous.span);
        let Ok(value) = lexeme.parse::<f64>() else {
            self.error(CompileErrorKind::ExpectedExpression);
            return;
        };
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let span = self.previous.span;
        // Trim the surrounding quotes.
        let content = Span {
            start: span.start + 1,
            length: span.length.saturating_sub(2),
        };
        let text = self.lexeme(content);
        let handle = self.heap.intern(text);
        self.emit_constant(Value::String(handle));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::KeywordTrue => self.emit(OpCode::True),
            TokenKind::KeywordFalse => self.emit(OpCode::False),
            TokenKind::KeywordNil => self.emit(OpCode::Nil),
            _ => unreachable!("literal rule on a non-literal token."),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.lexeme(self.previous.span);
        self.named_variable(name, can_assign);
    }

    fn this(&mut self, _can_assign: bool) {
        if self.class_depth == 0 {
            self.error(CompileErrorKind::ThisOutsideClass);
            return;
        }
        // `this` reads the reserved receiver slot; never assignable.
        self.named_variable("this", false);
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit(OpCode::Negate),
            TokenKind::Bang => self.emit(OpCode::Not),
            _ => unreachable!("unary rule on a non-unary token."),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(rule(operator).precedence.next());
        match operator {
            TokenKind::Plus => self.emit(OpCode::Add),
            TokenKind::Minus => self.emit(OpCode::Subtract),
            TokenKind::Star => self.emit(OpCode::Multiply),
            TokenKind::Slash => self.emit(OpCode::Divide),
            TokenKind::EqualEqual => self.emit(OpCode::Equal),
            TokenKind::BangEqual => {
                self.emit(OpCode::Equal);
                self.emit(OpCode::Not);
            }
            TokenKind::GreaterThan => self.emit(OpCode::Greater),
            TokenKind::GreaterThanEqual => {
                self.emit(OpCode::Less);
                self.emit(OpCode::Not);
            }
            TokenKind::LessThan => self.emit(OpCode::Less),
            TokenKind::LessThanEqual => {
                self.emit(OpCode::Greater);
                self.emit(OpCode::Not);
            }
            _ => unreachable!("binary rule on a non-binary token."),
        }
    }

    fn and_operator(&mut self, _can_assign: bool) {
        // Falsy left operand short-circuits and is the result.
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_operator(&mut self, _can_assign: bool) {
        // There is no jump-if-true: a falsy left operand hops over the
        // unconditional exit into the right operand.
        let right_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(right_jump);
        self.emit(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let arity = self.argument_list();
        self.emit(OpCode::Call(arity));
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.advance_if(TokenKind::RightParenthesis) {
            loop {
                count += 1;
                if count > MAX_ARITY {
                    self.error(CompileErrorKind::TooManyArguments);
                }
                self.expression();
                if self.advance_if(TokenKind::Comma) {
                    continue;
                }
                if self.advance_if(TokenKind::RightParenthesis) {
                    break;
                }
                self.error_at_current(CompileErrorKind::Expected {
                    what: "expected ',' or ')' after argument",
                });
                break;
            }
        }
        u8::try_from(count.min(MAX_ARITY)).expect("argument count is capped at 255.")
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Ident, "expected property name after '.'");
        let name = self.lexeme(self.previous.span);
        let index = self.identifier_constant(name);

        if can_assign && self.advance_if(TokenKind::Equal) {
            self.expression();
            self.emit(OpCode::SetProperty(index));
        } else {
            self.emit(OpCode::GetProperty(index));
        }
    }

    // ------------------------------------------------------------------
    // Collection.
    // ------------------------------------------------------------------

    /// Run a collection cycle if one is due. The roots are the functions of
    /// every in-progress context (their constant pools reach every object
    /// the compiler has created) plus whatever the host registered.
    fn maybe_collect(&mut self) {
        if !self.heap.should_collect() {
            return;
        }
        self.heap.begin_cycle();
        for context in &self.contexts {
            self.heap.mark_object(Object::Function(context.function));
        }
        if let Some(host) = self.host_roots {
            host.mark_roots(self.heap);
        }
        let freed = self.heap.collect();
        tracing::trace!(freed, "collected while compiling");
    }
}

/// Compile source text into the heap, returning the top-level function.
///
/// `host_roots` lets an embedder with live references into the heap (a REPL
/// keeping globals across lines, say) survive collections triggered while
/// compiling.
///
/// # Errors
/// Returns every compile error encountered, in source order. No bytecode is
/// produced if any error occurred.
pub fn compile(
    source: &str,
    heap: &mut Heap,
    host_roots: Option<&dyn MarkRoots>,
) -> Result<Handle<Function>, Vec<CompileError>> {
    Parser::new(source, heap, host_roots).run()
}

#[cfg(test)]
mod test {
    use super::compile;
    use crate::error::CompileErrorKind;
    use flint_runtime::heap::Heap;
    use flint_runtime::opcode::OpCode;

    fn opcodes(source: &str) -> Vec<OpCode> {
        let mut heap = Heap::new();
        let script = compile(source, &mut heap, None).expect("compilation should succeed.");
        let function = heap.function(script).unwrap();
        let code = function.chunk.code();
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < code.len() {
            let (opcode, next) = OpCode::decode(code, offset).expect("valid bytecode.");
            out.push(opcode);
            offset = next;
        }
        out
    }

    fn first_error(source: &str) -> CompileErrorKind {
        let mut heap = Heap::new();
        let errors = compile(source, &mut heap, None).expect_err("compilation should fail.");
        errors.into_iter().next().unwrap().kind
    }

    #[test]
    fn arithmetic_emits_operators_after_operands() {
        assert_eq!(
            opcodes("print 1 + 2 * 3;"),
            vec![
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Constant(2),
                OpCode::Multiply,
                OpCode::Add,
                OpCode::Print,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn comparison_operators_lower_to_negations() {
        assert_eq!(
            opcodes("1 <= 2;"),
            vec![
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Greater,
                OpCode::Not,
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn globals_compile_to_named_instructions() {
        // The initializer compiles before the name constant, and each
        // mention of the name adds its own pool entry.
        assert_eq!(
            opcodes("var a = 1; a = 2;"),
            vec![
                OpCode::Constant(0),
                OpCode::DefineGlobal(1),
                OpCode::Constant(3),
                OpCode::SetGlobal(2),
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn block_locals_are_slot_addressed_and_popped() {
        assert_eq!(
            opcodes("{ var a = 1; print a; }"),
            vec![
                OpCode::Constant(0),
                OpCode::GetLocal(1),
                OpCode::Print,
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn if_condition_is_popped_on_both_paths() {
        let ops = opcodes("if (true) print 1;");
        assert_eq!(
            ops,
            vec![
                OpCode::True,
                OpCode::JumpIfFalse(7),
                OpCode::Pop,
                OpCode::Constant(0),
                OpCode::Print,
                OpCode::Jump(1),
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn while_loops_jump_backwards() {
        let ops = opcodes("while (false) print 1;");
        assert!(ops.iter().any(|op| matches!(op, OpCode::Jump(offset) if *offset < 0)));
    }

    #[test]
    fn duplicate_local_is_rejected() {
        assert!(matches!(
            first_error("{ var a = 1; var a = 2; }"),
            CompileErrorKind::DuplicateLocal { .. }
        ));
    }

    #[test]
    fn shadowing_in_inner_scope_is_allowed() {
        let mut heap = Heap::new();
        assert!(compile("{ var a = 1; { var a = 2; } }", &mut heap, None).is_ok());
    }

    #[test]
    fn read_in_own_initializer_is_rejected() {
        assert!(matches!(
            first_error("{ var a = 1; { var a = a; } }"),
            CompileErrorKind::ReadInOwnInitializer { .. }
        ));
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        assert!(matches!(
            first_error("var a = 1; var b = 2; a + b = 3;"),
            CompileErrorKind::InvalidAssignmentTarget
        ));
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert!(matches!(
            first_error("return 1;"),
            CompileErrorKind::ReturnAtTopLevel
        ));
    }

    #[test]
    fn this_outside_a_class_is_rejected() {
        assert!(matches!(
            first_error("print this;"),
            CompileErrorKind::ThisOutsideClass
        ));
    }

    #[test]
    fn initializer_cannot_return_a_value() {
        assert!(matches!(
            first_error("class A { init() { return 1; } }"),
            CompileErrorKind::ReturnValueFromInitializer
        ));
    }

    #[test]
    fn bare_return_in_initializer_is_allowed() {
        let mut heap = Heap::new();
        assert!(compile("class A { init() { return; } }", &mut heap, None).is_ok());
    }

    #[test]
    fn closures_record_capture_descriptors() {
        let mut heap = Heap::new();
        let script = compile(
            "fun outer() { var x = 1; fun inner() { print x; } }",
            &mut heap,
            None,
        )
        .unwrap();
        let outer = heap
            .function(script)
            .unwrap()
            .chunk
            .constants()
            .iter()
            .find_map(|value| match value {
                flint_runtime::value::Value::Function(handle) => Some(*handle),
                _ => None,
            })
            .unwrap();
        let inner = heap
            .function(outer)
            .unwrap()
            .chunk
            .constants()
            .iter()
            .find_map(|value| match value {
                flint_runtime::value::Value::Function(handle) => Some(*handle),
                _ => None,
            })
            .unwrap();
        let descriptors = &heap.function(inner).unwrap().upvalues;
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].is_local);
        assert_eq!(descriptors[0].index, 1);
    }

    #[test]
    fn errors_report_lines_and_continue() {
        let mut heap = Heap::new();
        let errors = compile("var 1;\nprint 2 +;\n", &mut heap, None).unwrap_err();
        assert!(errors.len() >= 2);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[1].line, 2);
        let mut rendered = String::new();
        errors[0].format(&mut rendered).unwrap();
        assert!(rendered.starts_with("[line 1] Error: "));
    }

    #[test]
    fn scanner_errors_surface_as_compile_errors() {
        assert!(matches!(
            first_error("var a = @;"),
            CompileErrorKind::Scanner { .. }
        ));
    }
}
