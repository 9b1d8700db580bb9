//! Slot accounting for field and method descriptors.
//!
//! `long` and `double` occupy two operand stack slots and two local slots,
//! everything else one.

use crate::error::ClassFileError;

/// Slots taken by a field descriptor such as `F`, `[C` or `Ljava/lang/String;`.
pub fn field_slots(descriptor: &str) -> Result<u16, ClassFileError> {
    let bytes = descriptor.as_bytes();
    match parse_type(bytes, 0) {
        Some((slots, end)) if end == bytes.len() => Ok(slots),
        _ => Err(ClassFileError::BadDescriptor(descriptor.to_string())),
    }
}

/// `(argument slots, return slots)` of a method descriptor such as `(FF)F`.
pub fn method_slots(descriptor: &str) -> Result<(u16, u16), ClassFileError> {
    let bad = || ClassFileError::BadDescriptor(descriptor.to_string());
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(bad());
    }

    let mut pos = 1;
    let mut args = 0u16;
    while bytes.get(pos) != Some(&b')') {
        let (slots, next) = parse_type(bytes, pos).ok_or_else(bad)?;
        args += slots;
        pos = next;
    }
    pos += 1;

    let ret = if bytes.get(pos) == Some(&b'V') {
        pos += 1;
        0
    } else {
        let (slots, next) = parse_type(bytes, pos).ok_or_else(bad)?;
        pos = next;
        slots
    };

    if pos != bytes.len() {
        return Err(bad());
    }
    Ok((args, ret))
}

fn parse_type(bytes: &[u8], pos: usize) -> Option<(u16, usize)> {
    match *bytes.get(pos)? {
        b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' => Some((1, pos + 1)),
        b'J' | b'D' => Some((2, pos + 1)),
        b'L' => {
            let len = bytes[pos..].iter().position(|&b| b == b';')?;
            (len > 1).then_some((1, pos + len + 1))
        }
        b'[' => {
            let (_, end) = parse_type(bytes, pos + 1)?;
            Some((1, end))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_method_slots() {
        assert_eq!(method_slots("()V"), Ok((0, 0)));
        assert_eq!(method_slots("(FF)F"), Ok((2, 1)));
        assert_eq!(method_slots("([CII)[C"), Ok((3, 1)));
        assert_eq!(method_slots("(DD)D"), Ok((4, 2)));
        assert_eq!(
            method_slots("(Ljava/lang/Object;ILjava/lang/Object;II)V"),
            Ok((5, 0))
        );
        assert_eq!(method_slots("(I)[Ljava/lang/String;"), Ok((1, 1)));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(method_slots("FF)F").is_err());
        assert!(method_slots("(F").is_err());
        assert!(method_slots("(V)V").is_err());
        assert!(method_slots("(L;)V").is_err());
        assert!(field_slots("[").is_err());
        assert!(field_slots("FF").is_err());
    }

    #[test]
    fn counts_field_slots() {
        assert_eq!(field_slots("F"), Ok(1));
        assert_eq!(field_slots("[[C"), Ok(1));
        assert_eq!(field_slots("J"), Ok(2));
    }
}
