use base64::Engine;

/// Opaque page token: base64 of the decimal ASCII row offset. Encoding an
/// offset `<= 0` yields the empty string; decoding the empty string or any
/// token this module cannot parse yields offset 0.
pub fn encode(offset: i64) -> String {
  if offset <= 0 {
    return String::new();
  }
  base64::engine::general_purpose::STANDARD.encode(offset.to_string())
}

pub fn decode(token: &str) -> i64 {
  if token.is_empty() {
    return 0;
  }
  let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(token) else {
    return 0;
  };
  let Ok(text) = String::from_utf8(bytes) else {
    return 0;
  };
  text.parse::<i64>().unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_positive_offsets() {
    for offset in [1_i64, 2, 1000, 2500, i64::MAX / 2] {
      assert_eq!(decode(&encode(offset)), offset);
    }
  }

  #[test]
  fn non_positive_offsets_encode_empty() {
    assert_eq!(encode(0), "");
    assert_eq!(encode(-5), "");
  }

  #[test]
  fn empty_and_garbage_decode_to_zero() {
    assert_eq!(decode(""), 0);
    assert_eq!(decode("not valid base64!!"), 0);
    assert_eq!(decode("aGVsbG8="), 0); // valid base64, not an integer
  }
}
