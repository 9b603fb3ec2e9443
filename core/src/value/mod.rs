//! Script-visible values.
//!
//! A [`Value`] is a small tag union: scalars live inline, strings,
//! lists and structs live in the [`Pool`] and are referenced by a
//! pointer. A value *owns* the allocations it points at; moving a value
//! into a variable, list slot or struct field transfers that ownership.
//! Whoever discards an owned value calls [`release`] to hand its bytes
//! back to the pool.
//!
//! Pool encodings (little-endian):
//!
//! - element record, 16 bytes: tag at offset 0, payload at offset 8
//!   (integer bits, float bits, bool, or an aggregate's pool offset);
//! - string: `u32` length, then the UTF-8 bytes;
//! - list: `u32` length, `u32` capacity (in elements), then the element
//!   records;
//! - struct: `u32` field count, `u32` type-name string pointer, then
//!   per field a `u32` name string pointer, 4 bytes of padding, and the
//!   element record.

use crate::errors::{Error, Result};
use crate::memory::{Pointer, Pool};

pub mod ops;


pub(crate) const RECORD_SIZE: usize = 16;
const LIST_HEADER: usize = 8;
const STRUCT_HEADER: usize = 8;
const FIELD_STRIDE: usize = 8 + RECORD_SIZE;

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_STRUCT: u8 = 6;

/// A tagged script value. Not `Copy`: aggregate variants carry pool
/// ownership and must be moved, deep-cloned or released explicitly.
#[derive(Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Pointer),
    List(Pointer),
    Struct(Pointer),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The pool allocation backing this value, or `NULL` for scalars.
    pub fn pointer(&self) -> Pointer {
        match self {
            Value::Str(p) | Value::List(p) | Value::Struct(p) => *p,
            _ => Pointer::NULL,
        }
    }
}

fn out_of_memory(requested: usize) -> Error {
    Error::OutOfMemory { requested }
}

/// Marker for a corrupt record. Only reachable if arena bytes were
/// overwritten behind the value layer's back.
fn corrupt(pool: &Pool, at: Pointer) -> Error {
    Error::OutOfRange {
        ptr: at.offset(),
        len: RECORD_SIZE,
        size: pool.size(),
    }
}

fn write_record(pool: &mut Pool, at: Pointer, value: Value) -> Result<()> {
    let (tag, payload): (u8, u64) = match value {
        Value::Null => (TAG_NULL, 0),
        Value::Int(i) => (TAG_INT, i as u64),
        Value::Float(f) => (TAG_FLOAT, f.to_bits()),
        Value::Bool(b) => (TAG_BOOL, b as u64),
        Value::Str(p) => (TAG_STR, p.offset() as u64),
        Value::List(p) => (TAG_LIST, p.offset() as u64),
        Value::Struct(p) => (TAG_STRUCT, p.offset() as u64),
    };
    let mut record = [0u8; RECORD_SIZE];
    record[0] = tag;
    record[8..16].copy_from_slice(&payload.to_le_bytes());
    pool.bytes_mut(at, RECORD_SIZE)?.copy_from_slice(&record);
    Ok(())
}

fn read_record(pool: &Pool, at: Pointer) -> Result<Value> {
    let record = pool.bytes(at, RECORD_SIZE)?;
    let tag = record[0];
    let mut payload = [0u8; 8];
    payload.copy_from_slice(&record[8..16]);
    let payload = u64::from_le_bytes(payload);
    Ok(match tag {
        TAG_NULL => Value::Null,
        TAG_INT => Value::Int(payload as i64),
        TAG_FLOAT => Value::Float(f64::from_bits(payload)),
        TAG_BOOL => Value::Bool(payload != 0),
        TAG_STR => Value::Str(Pointer::from_offset(payload as u32)),
        TAG_LIST => Value::List(Pointer::from_offset(payload as u32)),
        TAG_STRUCT => Value::Struct(Pointer::from_offset(payload as u32)),
        _ => return Err(corrupt(pool, at)),
    })
}

fn alloc_str(pool: &mut Pool, text: &str) -> Result<Pointer> {
    let needed = 4 + text.len();
    let ptr = pool.allocate(needed);
    if ptr.is_null() {
        return Err(out_of_memory(needed));
    }
    pool.write_u32(ptr, text.len() as u32)?;
    pool.bytes_mut(ptr.add(4), text.len())?
        .copy_from_slice(text.as_bytes());
    Ok(ptr)
}

/// Store `text` in the pool and wrap it as a value.
pub fn new_str(pool: &mut Pool, text: &str) -> Result<Value> {
    Ok(Value::Str(alloc_str(pool, text)?))
}

/// Read the string a `Str` value points at.
pub fn str_value(pool: &Pool, ptr: Pointer) -> Result<String> {
    let len = pool.read_u32(ptr)? as usize;
    let bytes = pool.bytes(ptr.add(4), len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn list_slot(ptr: Pointer, index: usize) -> Pointer {
    ptr.add(LIST_HEADER + index * RECORD_SIZE)
}

/// Build a list from already-evaluated elements, taking ownership of
/// them. On allocation failure the elements are released before the
/// error is returned.
pub fn new_list(pool: &mut Pool, items: Vec<Value>) -> Result<Value> {
    let needed = LIST_HEADER + items.len() * RECORD_SIZE;
    let ptr = pool.allocate(needed);
    if ptr.is_null() {
        for item in &items {
            release(pool, item);
        }
        return Err(out_of_memory(needed));
    }
    let capacity = (Pool::block_size_for(needed) - LIST_HEADER) / RECORD_SIZE;
    pool.write_u32(ptr, items.len() as u32)?;
    pool.write_u32(ptr.add(4), capacity as u32)?;
    for (index, item) in items.into_iter().enumerate() {
        write_record(pool, list_slot(ptr, index), item)?;
    }
    Ok(Value::List(ptr))
}

pub fn list_len(pool: &Pool, ptr: Pointer) -> Result<usize> {
    Ok(pool.read_u32(ptr)? as usize)
}

/// Read the element at `index`.
///
/// The result aliases the stored element; [`deep_clone`] it before
/// storing it anywhere that takes ownership.
pub fn list_get(pool: &Pool, ptr: Pointer, index: usize) -> Result<Value> {
    let len = list_len(pool, ptr)?;
    if index >= len {
        return Err(Error::IndexOutOfBounds {
            index: index as i64,
            len,
        });
    }
    read_record(pool, list_slot(ptr, index))
}

/// Overwrite the element at `index`, releasing the previous element and
/// taking ownership of `value`.
pub fn list_set(pool: &mut Pool, ptr: Pointer, index: usize, value: Value) -> Result<()> {
    let len = list_len(pool, ptr)?;
    if index >= len {
        release(pool, &value);
        return Err(Error::IndexOutOfBounds {
            index: index as i64,
            len,
        });
    }
    let old = read_record(pool, list_slot(ptr, index))?;
    release(pool, &old);
    write_record(pool, list_slot(ptr, index), value)
}

/// Append `value`, growing the allocation if the capacity is exhausted.
/// Returns the (possibly moved) list pointer; the caller must update
/// whatever holds the list value when it changed.
pub fn list_append(pool: &mut Pool, ptr: Pointer, value: Value) -> Result<Pointer> {
    let len = list_len(pool, ptr)?;
    let capacity = pool.read_u32(ptr.add(4))? as usize;
    if len < capacity {
        write_record(pool, list_slot(ptr, len), value)?;
        pool.write_u32(ptr, (len + 1) as u32)?;
        return Ok(ptr);
    }

    let needed = LIST_HEADER + (len + 1) * RECORD_SIZE;
    let new_ptr = pool.allocate(needed);
    if new_ptr.is_null() {
        release(pool, &value);
        return Err(out_of_memory(needed));
    }
    let new_capacity = (Pool::block_size_for(needed) - LIST_HEADER) / RECORD_SIZE;
    let existing = pool.bytes(list_slot(ptr, 0), len * RECORD_SIZE)?.to_vec();
    pool.bytes_mut(list_slot(new_ptr, 0), len * RECORD_SIZE)?
        .copy_from_slice(&existing);
    pool.write_u32(new_ptr, (len + 1) as u32)?;
    pool.write_u32(new_ptr.add(4), new_capacity as u32)?;
    write_record(pool, list_slot(new_ptr, len), value)?;
    pool.free(ptr);
    Ok(new_ptr)
}

fn field_base(ptr: Pointer, index: usize) -> Pointer {
    ptr.add(STRUCT_HEADER + index * FIELD_STRIDE)
}

fn struct_count(pool: &Pool, ptr: Pointer) -> Result<usize> {
    Ok(pool.read_u32(ptr)? as usize)
}

/// Build a struct value from `(field name, value)` pairs, taking
/// ownership of the values.
pub fn new_struct(pool: &mut Pool, type_name: &str, fields: Vec<(String, Value)>) -> Result<Value> {
    // Name strings are allocated before the spine; a failed
    // construction never leaves a partially initialised struct behind.
    let mut name_ptrs = Vec::with_capacity(fields.len());
    for (name, _) in &fields {
        match alloc_str(pool, name) {
            Ok(p) => name_ptrs.push(p),
            Err(err) => {
                for p in name_ptrs {
                    pool.free(p);
                }
                for (_, value) in &fields {
                    release(pool, value);
                }
                return Err(err);
            }
        }
    }
    let type_name_ptr = match alloc_str(pool, type_name) {
        Ok(p) => p,
        Err(err) => {
            for p in name_ptrs {
                pool.free(p);
            }
            for (_, value) in &fields {
                release(pool, value);
            }
            return Err(err);
        }
    };

    let needed = STRUCT_HEADER + fields.len() * FIELD_STRIDE;
    let ptr = pool.allocate(needed);
    if ptr.is_null() {
        for p in name_ptrs {
            pool.free(p);
        }
        pool.free(type_name_ptr);
        for (_, value) in &fields {
            release(pool, value);
        }
        return Err(out_of_memory(needed));
    }

    pool.write_u32(ptr, fields.len() as u32)?;
    pool.write_u32(ptr.add(4), type_name_ptr.offset())?;
    for (index, (_, value)) in fields.into_iter().enumerate() {
        let base = field_base(ptr, index);
        pool.write_u32(base, name_ptrs[index].offset())?;
        pool.write_u32(base.add(4), 0)?;
        write_record(pool, base.add(8), value)?;
    }
    Ok(Value::Struct(ptr))
}

pub fn struct_type_name(pool: &Pool, ptr: Pointer) -> Result<String> {
    let name_ptr = Pointer::from_offset(pool.read_u32(ptr.add(4))?);
    str_value(pool, name_ptr)
}

/// `(field name, value view)` pairs in definition order.
pub fn struct_fields(pool: &Pool, ptr: Pointer) -> Result<Vec<(String, Value)>> {
    let count = struct_count(pool, ptr)?;
    let mut fields = Vec::with_capacity(count);
    for index in 0..count {
        let base = field_base(ptr, index);
        let name_ptr = Pointer::from_offset(pool.read_u32(base)?);
        let name = str_value(pool, name_ptr)?;
        let value = read_record(pool, base.add(8))?;
        fields.push((name, value));
    }
    Ok(fields)
}

fn struct_find(pool: &Pool, ptr: Pointer, field: &str) -> Result<Option<usize>> {
    let count = struct_count(pool, ptr)?;
    for index in 0..count {
        let base = field_base(ptr, index);
        let name_ptr = Pointer::from_offset(pool.read_u32(base)?);
        if str_value(pool, name_ptr)? == field {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Read a field by name. The result aliases the stored field.
pub fn struct_get(pool: &Pool, ptr: Pointer, field: &str) -> Result<Value> {
    match struct_find(pool, ptr, field)? {
        Some(index) => read_record(pool, field_base(ptr, index).add(8)),
        None => Err(Error::UnknownField {
            ty: struct_type_name(pool, ptr)?,
            field: field.to_string(),
        }),
    }
}

/// Overwrite a field by name, releasing the previous value and taking
/// ownership of `value`.
pub fn struct_set(pool: &mut Pool, ptr: Pointer, field: &str, value: Value) -> Result<()> {
    match struct_find(pool, ptr, field)? {
        Some(index) => {
            let slot = field_base(ptr, index).add(8);
            let old = read_record(pool, slot)?;
            release(pool, &old);
            write_record(pool, slot, value)
        }
        None => {
            let ty = struct_type_name(pool, ptr)?;
            release(pool, &value);
            Err(Error::UnknownField {
                ty,
                field: field.to_string(),
            })
        }
    }
}

/// Shallow copy that aliases the same allocations as `value`.
///
/// For transient reads of a stored value (a variable cell, a list slot,
/// a struct field). An alias owns nothing: never release it, and
/// [`deep_clone`] it before storing it anywhere.
pub(crate) fn alias(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Float(*f),
        Value::Bool(b) => Value::Bool(*b),
        Value::Str(p) => Value::Str(*p),
        Value::List(p) => Value::List(*p),
        Value::Struct(p) => Value::Struct(*p),
    }
}

/// Return every allocation owned by `value` to the pool.
///
/// Like `Pool::free`, this is best-effort and silent: a value whose
/// backing bytes can no longer be decoded is simply dropped.
pub fn release(pool: &mut Pool, value: &Value) {
    match value {
        Value::Str(p) => pool.free(*p),
        Value::List(p) => {
            if let Ok(len) = list_len(pool, *p) {
                for index in 0..len {
                    if let Ok(element) = list_get(pool, *p, index) {
                        release(pool, &element);
                    }
                }
            }
            pool.free(*p);
        }
        Value::Struct(p) => {
            if let Ok(fields) = struct_fields(pool, *p) {
                for (_, field_value) in &fields {
                    release(pool, field_value);
                }
            }
            if let Ok(count) = struct_count(pool, *p) {
                for index in 0..count {
                    if let Ok(name_ptr) = pool.read_u32(field_base(*p, index)) {
                        pool.free(Pointer::from_offset(name_ptr));
                    }
                }
            }
            if let Ok(type_name_ptr) = pool.read_u32(p.add(4)) {
                pool.free(Pointer::from_offset(type_name_ptr));
            }
            pool.free(*p);
        }
        _ => {}
    }
}

/// Copy a value so the copy owns fresh allocations, recursively.
pub fn deep_clone(pool: &mut Pool, value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Str(p) => {
            let text = str_value(pool, *p)?;
            new_str(pool, &text)
        }
        Value::List(p) => {
            let len = list_len(pool, *p)?;
            let mut items = Vec::with_capacity(len);
            for index in 0..len {
                let element = list_get(pool, *p, index)?;
                match deep_clone(pool, &element) {
                    Ok(copy) => items.push(copy),
                    Err(err) => {
                        for item in &items {
                            release(pool, item);
                        }
                        return Err(err);
                    }
                }
            }
            new_list(pool, items)
        }
        Value::Struct(p) => {
            let type_name = struct_type_name(pool, *p)?;
            let fields = struct_fields(pool, *p)?;
            let mut copies = Vec::with_capacity(fields.len());
            for (name, field_value) in &fields {
                match deep_clone(pool, field_value) {
                    Ok(copy) => copies.push((name.clone(), copy)),
                    Err(err) => {
                        for (_, copy) in &copies {
                            release(pool, copy);
                        }
                        return Err(err);
                    }
                }
            }
            new_struct(pool, &type_name, copies)
        }
    }
}

/// The textual form `__print` writes: strings raw, lists bracketed,
/// structs as `Name{field: value, …}`.
pub fn display(pool: &Pool, value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "null".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(p) => str_value(pool, *p)?,
        Value::List(p) => {
            let len = list_len(pool, *p)?;
            let mut parts = Vec::with_capacity(len);
            for index in 0..len {
                let element = list_get(pool, *p, index)?;
                parts.push(display(pool, &element)?);
            }
            format!("[{}]", parts.join(", "))
        }
        Value::Struct(p) => {
            let mut parts = Vec::new();
            for (name, field_value) in struct_fields(pool, *p)? {
                parts.push(format!("{}: {}", name, display(pool, &field_value)?));
            }
            format!("{}{{{}}}", struct_type_name(pool, *p)?, parts.join(", "))
        }
    })
}

/// Condition semantics for `if`/`while`/`for`: bools, and integers with
/// zero as false.
pub fn truthy(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        other => Err(Error::Condition {
            found: other.type_name(),
        }),
    }
}
