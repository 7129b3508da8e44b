use base64::{
  alphabet,
  engine::{general_purpose::GeneralPurposeConfig, DecodePaddingMode, GeneralPurpose},
  Engine,
};
use serde_json::Value;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::RequireNone)
    .with_decode_allow_trailing_bits(true),
);

/// Decodes base64 without ever rejecting the input.
///
/// The url-safe alphabet is folded into the standard one, any other character
/// outside the alphabet is skipped, and decoding stops at the first `=`. A
/// dangling sextet at the end carries less than a byte and is dropped.
pub fn decode_base64_lenient(input: &str) -> Vec<u8> {
  let mut symbols: Vec<u8> = input
    .bytes()
    .take_while(|b| *b != b'=')
    .filter_map(|b| match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => Some(b),
      b'-' => Some(b'+'),
      b'_' => Some(b'/'),
      _ => None,
    })
    .collect();

  if symbols.len() % 4 == 1 {
    symbols.pop();
  }

  LENIENT.decode(&symbols).unwrap_or_default()
}

/// Pretty JSON with two-space indentation.
pub fn to_pretty_json(value: &Value) -> serde_json::Result<Vec<u8>> {
  serde_json::to_vec_pretty(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use base64::engine::general_purpose::STANDARD;
  use serde_json::json;

  #[test]
  fn decodes_padded_input() {
    assert_eq!(decode_base64_lenient("aGVsbG8="), b"hello");
  }

  #[test]
  fn well_formed_input_round_trips() {
    let inputs = [
      "",
      "aA==",
      "aGk=",
      "aGVsbG8gd29ybGQ=",
      "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==",
    ];

    for input in inputs {
      let decoded = decode_base64_lenient(input);
      assert_eq!(STANDARD.encode(decoded), input);
    }
  }

  #[test]
  fn tolerates_missing_padding() {
    assert_eq!(decode_base64_lenient("aGVsbG8"), b"hello");
  }

  #[test]
  fn skips_characters_outside_the_alphabet() {
    assert_eq!(decode_base64_lenient("aGVs\nbG8=\n"), b"hello");
    assert_eq!(decode_base64_lenient("aG Vs*bG8"), b"hello");
  }

  #[test]
  fn accepts_url_safe_alphabet() {
    assert_eq!(decode_base64_lenient("-_8"), STANDARD.decode("+/8=").unwrap());
  }

  #[test]
  fn stops_at_first_padding_character() {
    assert_eq!(decode_base64_lenient("aGk=aGk="), b"hi");
  }

  #[test]
  fn never_fails_on_garbage() {
    assert_eq!(decode_base64_lenient("!!!"), Vec::<u8>::new());
    assert_eq!(decode_base64_lenient("a"), Vec::<u8>::new());
    assert_eq!(decode_base64_lenient("aGVsbG8=a"), b"hello");
  }

  #[test]
  fn pretty_json_uses_two_spaces() {
    let text = to_pretty_json(&json!({"a": 1})).unwrap();

    assert_eq!(String::from_utf8(text).unwrap(), "{\n  \"a\": 1\n}");
  }
}
