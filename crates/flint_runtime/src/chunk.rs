use crate::heap::Heap;
use crate::opcode::OpCode;
use crate::value::Value;
use core::fmt;

/// A record of the line table: every byte from `offset` until the next
/// record's offset belongs to `line`.
#[derive(Debug, Clone, Copy)]
struct LineRecord {
    offset: usize,
    line: usize,
}

/// A compact map from bytecode offsets to 1-based source lines.
///
/// Only line changes are recorded, so a run of bytes emitted for the same
/// line costs one record. Offsets are non-decreasing by construction.
#[derive(Debug, Default)]
pub struct LineTable {
    records: Vec<LineRecord>,
}

impl LineTable {
    /// Record that the byte at `offset` belongs to `line`.
    fn push(&mut self, offset: usize, line: usize) {
        match self.records.last() {
            Some(last) if last.line == line => {}
            _ => self.records.push(LineRecord { offset, line }),
        }
    }

    /// Return the greatest recorded line whose offset is at or below the
    /// query offset.
    #[must_use]
    pub fn line(&self, offset: usize) -> Option<usize> {
        let at_or_below = self
            .records
            .partition_point(|record| record.offset <= offset);
        let record = self.records.get(at_or_below.checked_sub(1)?)?;
        Some(record.line)
    }
}

/// The bytecode of one compiled function: byte-addressed instructions, a
/// constant pool, and the line table.
#[derive(Debug, Default)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    lines: LineTable,
}

/// At most 256 constants fit in a chunk's pool; indices are single bytes.
pub const MAX_CONSTANTS: usize = 256;

impl Chunk {
    /// Create an empty chunk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The instruction stream.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The constant pool.
    #[must_use]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// The offset one past the last emitted byte.
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether no code has been emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append a raw byte, attributing it to the given source line.
    pub fn write_u8(&mut self, byte: u8, line: usize) {
        self.lines.push(self.code.len(), line);
        self.code.push(byte);
    }

    /// Overwrite an already emitted byte. Used only for jump patching.
    pub fn patch_u8(&mut self, offset: usize, byte: u8) {
        self.code[offset] = byte;
    }

    /// Append a value to the constant pool and return its index, or `None`
    /// once the pool is full.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        let index = u8::try_from(self.constants.len()).ok()?;
        self.constants.push(value);
        Some(index)
    }

    /// Look up a constant by operand index.
    #[must_use]
    pub fn constant(&self, index: u8) -> Option<Value> {
        self.constants.get(usize::from(index)).copied()
    }

    /// The source line of the byte at the given offset.
    #[must_use]
    pub fn line_at(&self, offset: usize) -> Option<usize> {
        self.lines.line(offset)
    }

    /// Disassemble the chunk's bytecode into the given buffer.
    ///
    /// # Errors
    /// This function will error if it can not write into the buffer.
    pub fn disassemble(
        &self,
        buffer: &mut impl fmt::Write,
        name: &str,
        heap: &Heap,
    ) -> Result<(), fmt::Error> {
        const INDENT: &str = "  ";
        writeln!(buffer, "Chunk <{name}>:")?;

        let mut previous_line = None;
        let mut offset = 0;
        while offset < self.code.len() {
            let Some((opcode, mut next)) = OpCode::decode(&self.code, offset) else {
                writeln!(buffer, "{INDENT}{offset:04x}: ?? {:#04x}", self.code[offset])?;
                offset += 1;
                continue;
            };

            let line = self.line_at(offset);
            write!(buffer, "{INDENT}{offset:04x}:")?;
            if line == previous_line {
                write!(buffer, "{:>5} ", "|")?;
            } else {
                write!(buffer, "{:>5} ", format!("L{}", line.unwrap_or(0)))?;
            }
            previous_line = line;

            write!(buffer, "{opcode}")?;
            match opcode {
                OpCode::Constant(index)
                | OpCode::DefineGlobal(index)
                | OpCode::GetGlobal(index)
                | OpCode::SetGlobal(index)
                | OpCode::Class(index)
                | OpCode::GetProperty(index)
                | OpCode::SetProperty(index) => {
                    if let Some(value) = self.constant(index) {
                        write!(buffer, " '{}'", value.resolve(heap))?;
                    }
                }
                OpCode::Closure(index) => {
                    if let Some(value) = self.constant(index) {
                        write!(buffer, " '{}'", value.resolve(heap))?;
                    }
                    // The upvalue pairs trail the operand in the stream.
                    if let Some(Value::Function(handle)) = self.constant(index)
                        && let Some(function) = heap.function(handle)
                    {
                        for _ in 0..function.upvalues.len() {
                            let is_local = self.code.get(next).copied().unwrap_or(0);
                            let index = self.code.get(next + 1).copied().unwrap_or(0);
                            let source = if is_local == 1 { "local" } else { "upvalue" };
                            write!(buffer, " [{source} {index}]")?;
                            next += 2;
                        }
                    }
                }
                OpCode::Jump(jump) | OpCode::JumpIfFalse(jump) => {
                    let target = next
                        .checked_add_signed(isize::from(jump))
                        .unwrap_or(usize::MAX);
                    write!(buffer, " -> {target:04x}")?;
                }
                _ => {}
            }
            writeln!(buffer)?;
            offset = next;
        }
        writeln!(buffer)?;

        Ok(())
    }
}
