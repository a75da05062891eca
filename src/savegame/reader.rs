//! Binary variable-tree reader
//!
//! Parses the uncompressed savegame stream (see [`crate::savegame`] for the
//! byte layout) into a [`SaveGame`]. Only the structure is interpreted: blocks
//! are walked recursively, leaves are decoded according to their type name.

use crate::savegame::variable::{LeafTag, SaveGame, Value, Variable};
use crate::{Result, TrackerError};
use nom::branch::alt;
use nom::bytes::complete::{tag, take};
use nom::combinator::{map, value};
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{
    le_f32, le_i16, le_i32, le_i64, le_i8, le_u16, le_u32, le_u64, le_u8,
};
use nom::sequence::pair;
use nom::{IResult, Offset};

/// Length of the trailing footer: two offsets plus the `SE` marker
const FOOTER_LEN: usize = 10;

/// Deepest block nesting accepted; game saves stay a handful of levels deep
pub const MAX_BLOCK_DEPTH: usize = 256;

/// Parse failure carrying the position it happened at
#[derive(Debug)]
struct DecodeError<'a> {
    input: &'a [u8],
    reason: String,
    truncated: bool,
}

impl<'a> ParseError<&'a [u8]> for DecodeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        let reason = match kind {
            ErrorKind::Eof => "unexpected end of data".to_string(),
            ErrorKind::Tag => "unexpected marker bytes".to_string(),
            other => format!("parse failure ({other:?})"),
        };
        DecodeError {
            input,
            reason,
            truncated: kind == ErrorKind::Eof,
        }
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type Res<'a, T> = IResult<&'a [u8], T, DecodeError<'a>>;

fn fail<'a>(input: &'a [u8], reason: impl Into<String>) -> nom::Err<DecodeError<'a>> {
    nom::Err::Failure(DecodeError {
        input,
        reason: reason.into(),
        truncated: false,
    })
}

fn u16le(input: &[u8]) -> Res<'_, u16> {
    le_u16(input)
}

fn u32le(input: &[u8]) -> Res<'_, u32> {
    le_u32(input)
}

fn take_bytes(input: &[u8], n: usize) -> Res<'_, &[u8]> {
    take(n)(input)
}

fn magic<'a>(input: &'a [u8], expected: &'static str) -> Res<'a, &'a [u8]> {
    let parsed: Res<'a, &'a [u8]> = tag(expected)(input);
    parsed.map_err(|_| fail(input, format!("expected {expected:?} marker")))
}

/// Printable preview of the bytes at a failure site
fn preview(input: &[u8]) -> String {
    String::from_utf8_lossy(&input[..input.len().min(4)]).into_owned()
}

#[derive(Debug, Clone, Copy)]
enum Record {
    Block,
    Vl,
    Op,
    Aval,
    Porp,
}

fn record(input: &[u8]) -> Res<'_, Record> {
    let parsed: Res<'_, Record> = alt((
        value(Record::Block, tag("BLCK")),
        value(Record::Aval, tag("AVAL")),
        value(Record::Porp, tag("PORP")),
        value(Record::Vl, tag("VL")),
        value(Record::Op, tag("OP")),
    ))(input);
    parsed.map_err(|_| {
        fail(
            input,
            format!("unrecognized variable tag {:?}", preview(input)),
        )
    })
}

/// Walks variable records, resolving names through the string table
struct TreeReader {
    strings: Vec<String>,
}

impl TreeReader {
    fn name<'a>(&self, input: &'a [u8]) -> Res<'a, String> {
        let (rest, index) = u16le(input)?;
        match self.strings.get(index as usize) {
            Some(name) => Ok((rest, name.clone())),
            None => Err(fail(
                input,
                format!(
                    "name index {index} outside string table of {} entries",
                    self.strings.len()
                ),
            )),
        }
    }

    fn variable<'a>(&self, input: &'a [u8], depth: usize) -> Res<'a, Variable> {
        let (rest, kind) = record(input)?;
        match kind {
            Record::Block => self.block(rest, depth),
            Record::Vl => self.leaf(rest, LeafTag::Vl),
            Record::Op => self.leaf(rest, LeafTag::Op),
            Record::Aval => {
                let (rest, name) = self.name(rest)?;
                let (rest, type_name) = self.name(rest)?;
                let (rest, extra) = u32le(rest)?;
                let (rest, value) = self.value(rest, &type_name)?;
                Ok((
                    rest,
                    Variable::Leaf {
                        name,
                        tag: LeafTag::Aval(extra),
                        value,
                    },
                ))
            }
            Record::Porp => self.sized_leaf(rest),
        }
    }

    fn block<'a>(&self, input: &'a [u8], depth: usize) -> Res<'a, Variable> {
        if depth >= MAX_BLOCK_DEPTH {
            return Err(fail(input, format!("blocks nested deeper than {MAX_BLOCK_DEPTH}")));
        }
        let (input, name) = self.name(input)?;
        let (input, size) = u32le(input)?;
        let (rest, body) = take_bytes(input, size as usize).map_err(|_| {
            fail(
                input,
                format!(
                    "block '{name}' declares {size} bytes but only {} remain",
                    input.len()
                ),
            )
        })?;

        let mut cursor = body;
        let mut children = Vec::new();
        while !cursor.is_empty() {
            let (next, child) = self.variable(cursor, depth + 1).map_err(|err| match err {
                nom::Err::Error(e) | nom::Err::Failure(e) if e.truncated => fail(
                    cursor,
                    format!(
                        "block '{name}' declares {size} bytes but its children run past them"
                    ),
                ),
                other => other,
            })?;
            children.push(child);
            cursor = next;
        }

        Ok((rest, Variable::Block { name, children }))
    }

    fn leaf<'a>(&self, input: &'a [u8], tag: LeafTag) -> Res<'a, Variable> {
        let (rest, name) = self.name(input)?;
        let (rest, type_name) = self.name(rest)?;
        let (rest, value) = self.value(rest, &type_name)?;
        Ok((rest, Variable::Leaf { name, tag, value }))
    }

    /// `PORP` leaves carry their payload length, so unknown types survive as raw bytes
    fn sized_leaf<'a>(&self, input: &'a [u8]) -> Res<'a, Variable> {
        let (rest, name) = self.name(input)?;
        let (rest, type_name) = self.name(rest)?;
        let (rest, size) = u32le(rest)?;
        let (rest, payload) = take_bytes(rest, size as usize)?;

        let value = if is_known_type(&type_name) {
            let (left, value) = self.value(payload, &type_name)?;
            if !left.is_empty() {
                return Err(fail(
                    left,
                    format!(
                        "property '{name}' declares {size} bytes \
                         but its {type_name} value leaves {} unread",
                        left.len()
                    ),
                ));
            }
            value
        } else {
            Value::Raw {
                type_name,
                bytes: payload.to_vec(),
            }
        };

        Ok((
            rest,
            Variable::Leaf {
                name,
                tag: LeafTag::Porp,
                value,
            },
        ))
    }

    fn value<'a>(&self, input: &'a [u8], type_name: &str) -> Res<'a, Value> {
        match type_name {
            "Bool" => map(le_u8, |b: u8| Value::Bool(b != 0))(input),
            "Int8" => map(le_i8, Value::Int8)(input),
            "Uint8" => map(le_u8, Value::UInt8)(input),
            "Int16" => map(le_i16, Value::Int16)(input),
            "Uint16" => map(le_u16, Value::UInt16)(input),
            "Int32" => map(le_i32, Value::Int32)(input),
            "Uint32" => map(le_u32, Value::UInt32)(input),
            "Int64" => map(le_i64, Value::Int64)(input),
            "Uint64" => map(le_u64, Value::UInt64)(input),
            "Float" => map(le_f32, Value::Float)(input),
            "String" => {
                let (rest, len) = u16le(input)?;
                let (rest, raw) = take_bytes(rest, len as usize)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|_| fail(raw, "string value is not valid UTF-8"))?;
                Ok((rest, Value::String(text.to_string())))
            }
            "CName" => {
                let (rest, name) = self.name(input)?;
                Ok((rest, Value::CName(name)))
            }
            other => Err(fail(input, format!("unrecognized value type '{other}'"))),
        }
    }
}

fn is_known_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "Bool"
            | "Int8"
            | "Uint8"
            | "Int16"
            | "Uint16"
            | "Int32"
            | "Uint32"
            | "Int64"
            | "Uint64"
            | "Float"
            | "String"
            | "CName"
    )
}

fn header(input: &[u8]) -> Res<'_, [u32; 3]> {
    let (rest, _) = magic(input, "SAV3")?;
    let (rest, a) = u32le(rest)?;
    let (rest, b) = u32le(rest)?;
    let (rest, c) = u32le(rest)?;
    Ok((rest, [a, b, c]))
}

fn string_entry(input: &[u8]) -> Res<'_, String> {
    let (rest, len) = le_u8(input)?;
    let (rest, raw) = take_bytes(rest, len as usize)?;
    let text =
        std::str::from_utf8(raw).map_err(|_| fail(raw, "string table entry is not valid UTF-8"))?;
    Ok((rest, text.to_string()))
}

fn string_table(input: &[u8]) -> Res<'_, Vec<String>> {
    let (rest, _) = magic(input, "MANU")?;
    let (rest, n) = u32le(rest)?;
    let (rest, _reserved) = u32le(rest)?;
    // Every entry takes at least its length byte
    if n as usize > rest.len() {
        return Err(fail(
            input,
            format!("string table claims {n} entries but only {} bytes follow", rest.len()),
        ));
    }
    let (rest, strings) = count(string_entry, n as usize)(rest)?;
    let (rest, _) = magic(rest, "ENOD")?;
    Ok((rest, strings))
}

fn variable_index(input: &[u8]) -> Res<'_, Vec<(u32, u32)>> {
    let (rest, _) = magic(input, "RB")?;
    let (rest, n) = u32le(rest)?;
    if (n as usize).saturating_mul(8) > rest.len() {
        return Err(fail(
            input,
            format!("variable index claims {n} entries but only {} bytes follow", rest.len()),
        ));
    }
    count(pair(u32le, u32le), n as usize)(rest)
}

fn into_error(data: &[u8], err: nom::Err<DecodeError<'_>>) -> TrackerError {
    match err {
        nom::Err::Incomplete(_) => TrackerError::corrupt(data.len(), "unexpected end of data"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            TrackerError::corrupt(data.offset(e.input), e.reason)
        }
    }
}

/// Slice `data` from a table offset found in the footer
fn at<'a>(data: &'a [u8], offset: u32, what: &str) -> Result<&'a [u8]> {
    data.get(offset as usize..).ok_or_else(|| {
        TrackerError::corrupt(
            data.len(),
            format!("{what} offset {offset} is past the end of the {} byte stream", data.len()),
        )
    })
}

/// Decode an uncompressed savegame stream into its variable tree
pub fn parse_savegame(data: &[u8]) -> Result<SaveGame> {
    let (_, type_codes) = header(data).map_err(|e| into_error(data, e))?;

    if data.len() < FOOTER_LEN || !data.ends_with(b"SE") {
        return Err(TrackerError::corrupt(
            data.len().saturating_sub(2),
            "missing \"SE\" footer",
        ));
    }
    let footer = &data[data.len() - FOOTER_LEN..];
    let (_, (strings_at, index_at)) =
        pair(u32le, u32le)(footer).map_err(|e| into_error(data, e))?;

    let (_, strings) =
        string_table(at(data, strings_at, "string table")?).map_err(|e| into_error(data, e))?;
    let (_, index) =
        variable_index(at(data, index_at, "variable index")?).map_err(|e| into_error(data, e))?;

    let reader = TreeReader { strings };
    let mut sections = Vec::with_capacity(index.len());
    for (position, (offset, size)) in index.into_iter().enumerate() {
        let start = at(data, offset, "variable")?;
        let (rest, variable) = reader.variable(start, 0).map_err(|e| into_error(data, e))?;
        let consumed = start.offset(rest);
        if consumed != size as usize {
            return Err(TrackerError::corrupt(
                offset as usize,
                format!(
                    "top-level variable {position} ('{}') indexed as {size} bytes \
                     but occupies {consumed}",
                    variable.name()
                ),
            ));
        }
        sections.push(variable);
    }

    tracing::debug!(
        sections = sections.len(),
        strings = reader.strings.len(),
        "decoded savegame variable tree"
    );

    Ok(SaveGame {
        type_codes,
        sections,
    })
}
