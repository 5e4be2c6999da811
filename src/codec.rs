//! codec — текстовый IPv4 (dotted-quad) <-> u32.
//!
//! Формат строки: ровно четыре десятичных октета 0..=255 через '.', без знаков,
//! без ведущих нулей у многозначных октетов (как у std::net::Ipv4Addr).
//! Пробельные символы ASCII по краям строки отбрасываются; пустая строка после
//! trim — это `Parsed::Empty` (пропуск без отчёта), всё прочее — `Malformed`.
//!
//! Упаковка big-endian: octet0 -> биты 31..24, ..., octet3 -> биты 7..0.

/// Результат разбора одной строки входа.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    Address(u32),
    Empty,
    Malformed,
}

/// Разобрать сырую строку (без '\n'): trim + parse_addr.
#[inline]
pub fn parse_line(raw: &[u8]) -> Parsed {
    let line = raw.trim_ascii();
    if line.is_empty() {
        return Parsed::Empty;
    }
    match parse_addr(line) {
        Some(a) => Parsed::Address(a),
        None => Parsed::Malformed,
    }
}

/// Строгий разбор dotted-quad. None, если это не IPv4.
#[inline]
pub fn parse_addr(s: &[u8]) -> Option<u32> {
    let mut out: u32 = 0;
    let mut octets = 0u32;
    let mut cur: u32 = 0;
    let mut digits = 0u32;
    let mut leading_zero = false;

    for &c in s {
        match c {
            b'0'..=b'9' => {
                if digits == 0 {
                    leading_zero = c == b'0';
                } else if leading_zero {
                    return None;
                }
                digits += 1;
                if digits > 3 {
                    return None;
                }
                cur = cur * 10 + (c - b'0') as u32;
            }
            b'.' => {
                if digits == 0 || cur > 255 || octets == 3 {
                    return None;
                }
                out = (out << 8) | cur;
                octets += 1;
                cur = 0;
                digits = 0;
            }
            _ => return None,
        }
    }

    if octets != 3 || digits == 0 || cur > 255 {
        return None;
    }
    Some((out << 8) | cur)
}

/// Обратное преобразование: u32 -> "a.b.c.d".
pub fn format_addr(addr: u32) -> String {
    let [a, b, c, d] = addr.to_be_bytes();
    format!("{}.{}.{}.{}", a, b, c, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn parses_basic_quads() {
        assert_eq!(parse_addr(b"0.0.0.0"), Some(0));
        assert_eq!(parse_addr(b"255.255.255.255"), Some(u32::MAX));
        assert_eq!(parse_addr(b"10.0.0.1"), Some(0x0A00_0001));
        assert_eq!(parse_addr(b"1.2.3.4"), Some(0x0102_0304));
        assert_eq!(parse_addr(b"192.168.100.7"), Some(0xC0A8_6407));
    }

    #[test]
    fn rejects_garbage() {
        for bad in [
            &b""[..],
            b"1.2.3",
            b"1.2.3.4.5",
            b"1..2.3",
            b".1.2.3",
            b"1.2.3.",
            b"256.1.1.1",
            b"1.2.3.1000",
            b"01.2.3.4",
            b"1.2.3.04",
            b"+1.2.3.4",
            b"-1.2.3.4",
            b"1.2.3.4x",
            b"a.b.c.d",
            b"not-an-ip",
            b"::1",
            b"::ffff:1.2.3.4",
            b"fe80::1",
            b"example.com",
            b"1.2.3.4 5",
            b"1 .2.3.4",
        ] {
            assert_eq!(parse_addr(bad), None, "must reject {:?}", String::from_utf8_lossy(bad));
        }
    }

    #[test]
    fn line_trim_and_empty() {
        assert_eq!(parse_line(b""), Parsed::Empty);
        assert_eq!(parse_line(b"   \t\r"), Parsed::Empty);
        assert_eq!(parse_line(b"  5.5.5.5\r"), Parsed::Address(0x0505_0505));
        assert_eq!(parse_line(b"\t1.2.3.4  "), Parsed::Address(0x0102_0304));
        assert_eq!(parse_line(b"1.2.3.4 #comment"), Parsed::Malformed);
        assert_eq!(parse_line(b"not-an-ip"), Parsed::Malformed);
    }

    #[test]
    fn agrees_with_std_parser() {
        // single quads with every octet value in every position
        for v in 0u32..=255 {
            for pos in 0..4 {
                let addr = v << (8 * (3 - pos));
                let s = format_addr(addr);
                let std_addr: Ipv4Addr = s.parse().expect("std must parse");
                assert_eq!(parse_addr(s.as_bytes()), Some(u32::from(std_addr)));
            }
        }
        for s in ["00.1.1.1", "1.1.1.001", "300.1.1.1", "1.1.1", "1.1.1.1.", " 1.1.1.1"] {
            assert_eq!(parse_addr(s.as_bytes()).is_some(), s.parse::<Ipv4Addr>().is_ok(), "{s}");
        }
    }

    #[test]
    fn format_parse_roundtrip_sampled() {
        let mut x: u32 = 0x9E37_79B9;
        for _ in 0..100_000 {
            x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            assert_eq!(parse_addr(format_addr(x).as_bytes()), Some(x));
        }
        assert_eq!(parse_addr(format_addr(u32::MAX).as_bytes()), Some(u32::MAX));
        assert_eq!(parse_addr(format_addr(0).as_bytes()), Some(0));
    }
}
