//! Stand-ins for the Java platform methods generated code calls.
use classfile::MemberRef;

use super::machine::{Fault, INDEX_OUT_OF_BOUNDS, Machine, NUMBER_FORMAT, Object, ObjectRef, Value};

type Outcome = Result<Option<Value>, Fault>;

fn string(text: &str) -> Value {
    Value::new(Object::Str(text.encode_utf16().collect()))
}

fn text_of(value: Value) -> Result<String, Fault> {
    let object = value.non_null()?;
    let text = match &*object.borrow() {
        Object::Str(units) | Object::Chars(units) => String::from_utf16_lossy(units),
        other => return Err(Fault::halt(format!("expected a string, found {other:?}"))),
    };
    Ok(text)
}

fn arg(args: &mut std::vec::IntoIter<Value>) -> Result<Value, Fault> {
    args.next().ok_or_else(|| Fault::halt("missing argument"))
}

pub(super) fn call(
    machine: &mut Machine,
    method: &MemberRef,
    this: Option<ObjectRef>,
    args: Vec<Value>,
) -> Outcome {
    let mut args = args.into_iter();
    let receiver = || this.clone().ok_or_else(|| Fault::halt("missing receiver"));
    let value = match (
        method.class.as_str(),
        method.name.as_str(),
        method.descriptor.as_str(),
    ) {
        ("java/io/PrintStream", "print", "([C)V") => {
            let text = text_of(arg(&mut args)?)?;
            machine.output.push_str(&text);
            None
        }
        ("java/io/PrintStream", "print", "(C)V") => {
            let unit = arg(&mut args)?.int()? as u16;
            machine.output.push_str(&String::from_utf16_lossy(&[unit]));
            None
        }
        ("java/io/PrintStream", "flush", _) => None,

        ("java/lang/Math", "round", "(F)I") => {
            let x = arg(&mut args)?.float()?;
            Some(Value::Int(java_round(x)))
        }
        ("java/lang/Math", "abs", "(F)F") => Some(Value::Float(arg(&mut args)?.float()?.abs())),
        ("java/lang/Math", "pow", _) => {
            let x = arg(&mut args)?.double()?;
            let y = arg(&mut args)?.double()?;
            Some(Value::Double(x.powf(y)))
        }
        ("java/lang/Math", "random", _) => Some(Value::Double(next_random(machine))),
        ("java/lang/Math", name, "(D)D") => {
            let x = arg(&mut args)?.double()?;
            let y = match name {
                "atan" => x.atan(),
                "ceil" => x.ceil(),
                "cos" => x.cos(),
                "exp" => x.exp(),
                "floor" => x.floor(),
                "log" => x.ln(),
                "sin" => x.sin(),
                "sqrt" => x.sqrt(),
                "tan" => x.tan(),
                other => return Err(Fault::halt(format!("Math.{other}"))),
            };
            Some(Value::Double(y))
        }

        ("java/lang/String", "<init>", "([C)V") => {
            let text = text_of(arg(&mut args)?)?;
            *receiver()?.borrow_mut() = Object::Str(text.encode_utf16().collect());
            None
        }
        ("java/lang/String", "toCharArray", _) => {
            let units = match &*receiver()?.borrow() {
                Object::Str(units) => units.clone(),
                other => return Err(Fault::halt(format!("toCharArray on {other:?}"))),
            };
            Some(Value::new(Object::Chars(units)))
        }
        ("java/lang/String", "trim", _) => {
            let text = text_of(Value::Ref(receiver()?))?;
            Some(string(text.trim_matches(|c: char| c <= ' ')))
        }

        ("java/lang/Float", "parseFloat", _) => {
            let text = text_of(arg(&mut args)?)?;
            let value = parse_float(&text).ok_or_else(|| {
                Fault::throw(NUMBER_FORMAT, Some(format!("For input string: \"{text}\"")))
            })?;
            Some(Value::Float(value))
        }
        ("java/lang/Float", "toString", _) => {
            Some(string(&float_to_string(arg(&mut args)?.float()?)))
        }
        ("java/lang/Integer", "toString", _) => Some(string(&arg(&mut args)?.int()?.to_string())),

        ("java/lang/System", "arraycopy", _) => {
            let src = arg(&mut args)?.non_null()?;
            let src_pos = arg(&mut args)?.int()?;
            let dest = arg(&mut args)?.non_null()?;
            let dest_pos = arg(&mut args)?.int()?;
            let length = arg(&mut args)?.int()?;
            arraycopy(&src, src_pos, &dest, dest_pos, length)?;
            None
        }

        ("java/lang/Throwable", "getMessage", _) => match &*receiver()?.borrow() {
            Object::Throwable { message, .. } => {
                Some(message.as_deref().map_or(Value::Null, string))
            }
            other => return Err(Fault::halt(format!("getMessage on {other:?}"))),
        },
        ("java/lang/RuntimeException", "<init>", _) => {
            let message = match arg(&mut args)?.object()? {
                Some(text) => Some(text_of(Value::Ref(text))?),
                None => None,
            };
            *receiver()?.borrow_mut() = Object::Throwable {
                class: method.class.clone(),
                message,
            };
            None
        }

        ("java/io/InputStreamReader", "<init>", _) => {
            *receiver()?.borrow_mut() = Object::InputStreamReader;
            None
        }
        ("java/io/BufferedReader", "<init>", _) => {
            *receiver()?.borrow_mut() = Object::BufferedReader;
            None
        }
        ("java/io/BufferedReader", "readLine", _) => {
            Some(machine.input.pop_front().map_or(Value::Null, |line| string(&line)))
        }

        _ => {
            return Err(Fault::halt(format!(
                "no native {}.{}{}",
                method.class, method.name, method.descriptor
            )));
        }
    };
    Ok(value)
}

/// `Math.round(float)`: floor of `x + 0.5`, saturating, NaN to 0.
fn java_round(x: f32) -> i32 {
    (f64::from(x) + 0.5).floor() as i32
}

/// A fixed xorshift sequence so runs are repeatable.
fn next_random(machine: &mut Machine) -> f64 {
    let mut x = machine.random;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    machine.random = x;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

/// `Float.parseFloat`: surrounding whitespace and a type suffix are allowed.
fn parse_float(text: &str) -> Option<f32> {
    let text = text.trim_matches(|c: char| c <= ' ');
    match text {
        "NaN" => return Some(f32::NAN),
        "Infinity" | "+Infinity" => return Some(f32::INFINITY),
        "-Infinity" => return Some(f32::NEG_INFINITY),
        _ => {}
    }
    let digits = text
        .strip_suffix(['f', 'F', 'd', 'D'])
        .unwrap_or(text);
    let well_formed = digits
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !well_formed || !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `Float.toString`: plain notation in `[1e-3, 1e7)`, otherwise
/// computerized scientific notation, always with a fractional digit.
fn float_to_string(x: f32) -> String {
    if x.is_nan() {
        return "NaN".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    let magnitude = x.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = format!("{x}");
        return if text.contains('.') { text } else { format!("{text}.0") };
    }
    let text = format!("{x:e}");
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    if mantissa.contains('.') {
        format!("{mantissa}E{exponent}")
    } else {
        format!("{mantissa}.0E{exponent}")
    }
}

fn arraycopy(
    src: &ObjectRef,
    src_pos: i32,
    dest: &ObjectRef,
    dest_pos: i32,
    length: i32,
) -> Result<(), Fault> {
    let out_of_bounds = || Fault::throw(INDEX_OUT_OF_BOUNDS, Some("arraycopy".into()));
    let span = |pos: i32, len: usize| -> Result<std::ops::Range<usize>, Fault> {
        let start = usize::try_from(pos).map_err(|_| out_of_bounds())?;
        let count = usize::try_from(length).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(count).filter(|&end| end <= len);
        end.map(|end| start..end).ok_or_else(out_of_bounds)
    };
    let units = match &*src.borrow() {
        Object::Chars(units) => units.clone(),
        other => return Err(Fault::halt(format!("arraycopy from {other:?}"))),
    };
    let from = span(src_pos, units.len())?;
    match &mut *dest.borrow_mut() {
        Object::Chars(target) => {
            let to = span(dest_pos, target.len())?;
            target[to].copy_from_slice(&units[from]);
        }
        other => return Err(Fault::halt(format!("arraycopy into {other:?}"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_print_like_java() {
        assert_eq!(float_to_string(1.5), "1.5");
        assert_eq!(float_to_string(100.0), "100.0");
        assert_eq!(float_to_string(0.1), "0.1");
        assert_eq!(float_to_string(1e10), "1.0E10");
        assert_eq!(float_to_string(1.5e-5), "1.5E-5");
        assert_eq!(float_to_string(-0.0), "-0.0");
        assert_eq!(float_to_string(f32::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn parse_float_accepts_java_forms() {
        assert_eq!(parse_float(" 12.5 "), Some(12.5));
        assert_eq!(parse_float("3f"), Some(3.0));
        assert_eq!(parse_float("-1e2"), Some(-100.0));
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float("inf"), None);
    }

    #[test]
    fn round_half_up() {
        assert_eq!(java_round(2.5), 3);
        assert_eq!(java_round(-2.5), -2);
        assert_eq!(java_round(f32::NAN), 0);
        assert_eq!(java_round(1e20), i32::MAX);
    }
}
