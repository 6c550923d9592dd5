//! Pipeline functions chained after a variable with `|`.
//!
//! `$host|lower|len` resolves `$host`, lowercases it, then takes its length.
//! The built-in set covers length, case folding, FNV-1 and MD5 hashing;
//! more can be registered on the [`Dictionary`](super::Dictionary).

use md5::{Digest, Md5};

use super::value::Value;
use super::ExprError;

pub const FN_LEN: &str = "len";
pub const FN_UPPER: &str = "upper";
pub const FN_LOWER: &str = "lower";
pub const FN_FNV32: &str = "fnv32";
pub const FN_FNV64: &str = "fnv64";
pub const FN_MD5_LOWER: &str = "md5";
pub const FN_MD5_UPPER: &str = "MD5";

/// A single-argument transformation applied to a resolved variable.
pub type PipeFn = Box<dyn Fn(Value) -> Result<Value, ExprError> + Send + Sync>;

fn string_input(input: Value) -> Result<String, ExprError> {
    input
        .as_str()
        .ok_or_else(|| ExprError::TypeMismatch("pipeline input is not a string".into()))
}

pub(crate) fn pipe_len(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Int(string_input(input)?.len() as i64))
}

pub(crate) fn pipe_upper(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Str(string_input(input)?.to_uppercase()))
}

pub(crate) fn pipe_lower(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Str(string_input(input)?.to_lowercase()))
}

pub(crate) fn pipe_fnv32(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Int(fnv32(&string_input(input)?) as i64))
}

pub(crate) fn pipe_fnv64(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Int(fnv64(&string_input(input)?) as i64))
}

pub(crate) fn pipe_md5_lower(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Str(md5_hex(&string_input(input)?, false)))
}

pub(crate) fn pipe_md5_upper(input: Value) -> Result<Value, ExprError> {
    Ok(Value::Str(md5_hex(&string_input(input)?, true)))
}

fn md5_hex(s: &str, upper: bool) -> String {
    let digest = Md5::digest(s.as_bytes());
    digest
        .iter()
        .map(|b| {
            if upper {
                format!("{b:02X}")
            } else {
                format!("{b:02x}")
            }
        })
        .collect()
}

/// FNV-1 32-bit hash, also used by the IP-hash and URL-parameter selection
/// policies.
pub(crate) fn fnv32(s: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for b in s.as_bytes() {
        hash = hash.wrapping_mul(16_777_619);
        hash ^= u32::from(*b);
    }
    hash
}

pub(crate) fn fnv64(s: &str) -> u64 {
    let mut hash: u64 = 14_695_981_039_346_656_037;
    for b in s.as_bytes() {
        hash = hash.wrapping_mul(1_099_511_628_211);
        hash ^= u64::from(*b);
    }
    hash
}

/// Split a `$var|fn1|fn2` reference into the origin variable and its
/// function chain. Returns `None` when there is no pipeline.
pub(crate) fn split(reference: &str) -> Option<(&str, Vec<&str>)> {
    if !reference.contains('|') {
        return None;
    }
    let mut parts = reference.split('|');
    let origin = parts.next().unwrap_or_default();
    Some((origin, parts.collect()))
}
