//! SQLite's `INTEGER PRIMARY KEY` is a signed 64-bit value; a raw
//! `u64` inode number can exceed `i64::MAX` on filesystems that hand
//! out large inode numbers. Fold the upper half of the `u64` range
//! down into negative `i64`s rather than truncating, so the mapping
//! stays a bijection (§4.3).

pub fn to_sqlite(inode: u64) -> i64 {
    if inode <= i64::MAX as u64 {
        inode as i64
    } else {
        (inode as i128 - (1i128 << 64)) as i64
    }
}

pub fn from_sqlite(value: i64) -> u64 {
    if value >= 0 {
        value as u64
    } else {
        (value as i128 + (1i128 << 64)) as u64
    }
}
