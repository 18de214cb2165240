//! Saltpack ASCII armor framing
//!
//! ```text
//! BEGIN[ APP] SALTPACK <TYPE>. <word> <word> ... <word>. END[ APP] SALTPACK <TYPE>.
//! ```
//!
//! Words are 15 characters, 200 words to a line. Raw armor drops the framing and
//! separates 43-character groups with single spaces.

use std::sync::OnceLock;

use regex::Regex;
use saltpack_core::config::ArmorConfig;
use saltpack_core::{MessageType, SaltpackError, SaltpackResult};

use crate::basex::{decode_block_bytes, encode_block, Alphabet, BASE62};

/// Bytes per armor block
pub const DEFAULT_BLOCK_SIZE: usize = 32;
/// Characters per word in framed armor
pub const WORD_LENGTH: usize = 15;
/// Words per line in framed armor
pub const WORDS_PER_LINE: usize = 200;
/// Characters per group in raw armor
pub const RAW_GROUP_LENGTH: usize = 43;

const HEADER_PATTERN: &str = r"^[>\n\r\t ]*BEGIN[>\n\r\t ]+(([a-zA-Z0-9]+)[>\n\r\t ]+)?SALTPACK[>\n\r\t ]+(MESSAGE|ENCRYPTED[>\n\r\t ]+MESSAGE|SIGNED[>\n\r\t ]+MESSAGE|DETACHED[>\n\r\t ]+SIGNATURE)[>\n\r\t ]*$";
const FOOTER_PATTERN: &str = r"^[>\n\r\t ]*END[>\n\r\t ]+(([a-zA-Z0-9]+)[>\n\r\t ]+)?SALTPACK[>\n\r\t ]+(MESSAGE|ENCRYPTED[>\n\r\t ]+MESSAGE|SIGNED[>\n\r\t ]+MESSAGE|DETACHED[>\n\r\t ]+SIGNATURE)[>\n\r\t ]*$";

static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
static FOOTER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Armor and dearmor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmorOptions {
    pub alphabet: Alphabet,
    /// Bytes per block (default: 32)
    pub block_size: usize,
    /// Omit the header and footer
    pub raw: bool,
    /// Move the spare bits of each block to the low end
    pub shift: bool,
    /// Type written to the header and footer
    pub message_type: MessageType,
    /// Application name written to the header and footer (e.g. "KEYBASE")
    pub app_name: Option<String>,
}

impl Default for ArmorOptions {
    fn default() -> Self {
        Self {
            alphabet: BASE62,
            block_size: DEFAULT_BLOCK_SIZE,
            raw: false,
            shift: false,
            message_type: MessageType::Message,
            app_name: None,
        }
    }
}

impl From<&ArmorConfig> for ArmorOptions {
    fn from(config: &ArmorConfig) -> Self {
        Self {
            raw: config.raw,
            app_name: config.app_name.clone(),
            ..Self::default()
        }
    }
}

impl ArmorOptions {
    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Characters per encoded block
    pub fn char_block_size(&self) -> usize {
        self.alphabet.char_block_size(self.block_size)
    }

    pub fn validate(&self) -> SaltpackResult<()> {
        if self.block_size == 0 {
            return Err(SaltpackError::format("armor block size must be positive"));
        }
        if self.alphabet.len() < 2 {
            return Err(SaltpackError::format("armor alphabet is too small"));
        }
        if !self.raw && self.alphabet.contains(b'.') {
            return Err(SaltpackError::format(
                "alphabet contains '.' and can only be used for raw armor",
            ));
        }
        if let Some(app) = &self.app_name {
            if app.is_empty() || !app.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return Err(SaltpackError::Format(format!(
                    "armor app name {app:?} must be ASCII letters and digits"
                )));
            }
        }
        Ok(())
    }

    pub fn header(&self) -> String {
        format!("BEGIN{} SALTPACK {}. ", self.app_suffix(), self.message_type)
    }

    pub fn footer(&self) -> String {
        format!(". END{} SALTPACK {}.", self.app_suffix(), self.message_type)
    }

    fn app_suffix(&self) -> String {
        self.app_name
            .as_deref()
            .map(|app| format!(" {app}"))
            .unwrap_or_default()
    }
}

/// Message type and application name read from armor framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmorHeaderInfo {
    pub message_type: MessageType,
    pub app_name: Option<String>,
}

/// Result of [`dearmor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DearmorOutput {
    pub data: Vec<u8>,
    /// `None` for raw armor
    pub header_info: Option<ArmorHeaderInfo>,
    /// Everything after the footer's closing `.`; `None` for raw armor
    pub remaining: Option<Vec<u8>>,
}

/// Armor a complete buffer.
pub fn armor(input: &[u8], options: &ArmorOptions) -> SaltpackResult<String> {
    options.validate()?;

    let body: Vec<char> = input
        .chunks(options.block_size)
        .flat_map(|block| {
            encode_block(block, options.alphabet, options.shift)
                .chars()
                .collect::<Vec<_>>()
        })
        .collect();

    if options.raw {
        return Ok(join_groups(&body, RAW_GROUP_LENGTH, " "));
    }

    let words: Vec<String> = body
        .chunks(WORD_LENGTH)
        .map(|w| w.iter().collect())
        .collect();
    let lines: Vec<String> = words
        .chunks(WORDS_PER_LINE)
        .map(|line| line.join(" "))
        .collect();

    Ok(format!(
        "{}{}{}",
        options.header(),
        lines.join("\n"),
        options.footer()
    ))
}

/// Dearmor a complete buffer.
///
/// Framed input is split on its first three `.` characters into header, body and
/// footer; anything after the third is returned as `remaining`.
pub fn dearmor(input: &[u8], options: &ArmorOptions) -> SaltpackResult<DearmorOutput> {
    validate_for_decode(options)?;

    if options.raw {
        return Ok(DearmorOutput {
            data: decode_body(input, options)?,
            header_info: None,
            remaining: None,
        });
    }

    let mut parts = input.splitn(4, |&b| b == b'.');
    let header = parts.next().unwrap_or_default();
    let Some(body) = parts.next() else {
        return Err(missing_framing());
    };
    let header_info = parse_header(header)?;
    let Some(footer) = parts.next() else {
        return Err(missing_footer());
    };
    check_footer(&header_info, footer)?;
    let remaining = parts.next().unwrap_or_default().to_vec();

    let data = decode_body(body, options)?;
    tracing::debug!(
        message_type = %header_info.message_type,
        bytes = data.len(),
        "dearmored message"
    );

    Ok(DearmorOutput {
        data,
        header_info: Some(header_info),
        remaining: Some(remaining),
    })
}

/// Checks that apply when reading armor. The message type and app name come from the
/// input, so only the alphabet and block size matter.
pub(crate) fn validate_for_decode(options: &ArmorOptions) -> SaltpackResult<()> {
    ArmorOptions {
        message_type: MessageType::Message,
        app_name: None,
        ..options.clone()
    }
    .validate()
}

/// Whitespace and quoting characters that may appear between armor characters.
pub(crate) fn is_separator(b: u8, alphabet: Alphabet) -> bool {
    matches!(b, b'>' | b'\n' | b'\r' | b'\t' | b' ') && !alphabet.contains(b)
}

pub(crate) fn parse_header(header: &[u8]) -> SaltpackResult<ArmorHeaderInfo> {
    let text = std::str::from_utf8(header)
        .map_err(|_| SaltpackError::format("armor header is not valid UTF-8"))?;
    let re = framing_regex(&HEADER_REGEX, HEADER_PATTERN)?;
    let caps = re
        .captures(text)
        .ok_or_else(|| SaltpackError::format("invalid armor header"))?;
    header_info_from(&caps)
}

pub(crate) fn check_footer(header_info: &ArmorHeaderInfo, footer: &[u8]) -> SaltpackResult<()> {
    let text = std::str::from_utf8(footer)
        .map_err(|_| SaltpackError::format("armor footer is not valid UTF-8"))?;
    let re = framing_regex(&FOOTER_REGEX, FOOTER_PATTERN)?;
    let caps = re
        .captures(text)
        .ok_or_else(|| SaltpackError::format("invalid armor footer"))?;
    let footer_info = header_info_from(&caps)?;

    if &footer_info != header_info {
        tracing::warn!(
            header = %header_info.message_type,
            footer = %footer_info.message_type,
            "armor footer doesn't match header"
        );
        return Err(SaltpackError::format("armor footer doesn't match header"));
    }
    Ok(())
}

pub(crate) fn missing_framing() -> SaltpackError {
    SaltpackError::format("input doesn't contain a valid header and footer")
}

pub(crate) fn missing_footer() -> SaltpackError {
    SaltpackError::format("armor footer is missing")
}

fn header_info_from(caps: &regex::Captures<'_>) -> SaltpackResult<ArmorHeaderInfo> {
    let message_type = caps
        .get(3)
        .map(|m| m.as_str())
        .ok_or_else(|| SaltpackError::format("armor message type is missing"))?;
    Ok(ArmorHeaderInfo {
        message_type: MessageType::parse(message_type)?,
        app_name: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

fn framing_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> SaltpackResult<&'static Regex> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern)
        .map_err(|e| SaltpackError::Format(format!("armor framing pattern: {e}")))?;
    Ok(cell.get_or_init(|| re))
}

fn decode_body(body: &[u8], options: &ArmorOptions) -> SaltpackResult<Vec<u8>> {
    let chars: Vec<u8> = body
        .iter()
        .copied()
        .filter(|&b| !is_separator(b, options.alphabet))
        .collect();

    let mut out = Vec::with_capacity(chars.len() * options.block_size / options.char_block_size() + 1);
    for block in chars.chunks(options.char_block_size()) {
        out.extend(decode_block_bytes(block, options.alphabet, options.shift)?);
    }
    Ok(out)
}

fn join_groups(chars: &[char], group: usize, separator: &str) -> String {
    chars
        .chunks(group)
        .map(|g| g.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basex::{BASE64, BASE85};

    const INPUT_STRING: &str = "Two roads diverged in a yellow wood, and sorry I could not travel both\n\
                                and be one traveller, long I stood, and looked down one as far as I\n\
                                could, to where it bent in the undergrowth.";

    const ARMORED: &str = "BEGIN SALTPACK MESSAGE. K1pqnxb2DkrYwTF eoRpTHfQUiQ8Vhv QcqV2Ijl5OgvHQQ \
                           KXoeeJBRilQ1udq YjHoEWwyIgddRVZ SEswTz7nRxdPdgd RVjkX80hz6eArwG \
                           S2IaonQ5sEZH3Ia 5qxopd0rWOSAd4W 1MLaAPG3aIif4yU ymurJJlPkXjIGfc \
                           L3GAOA5RIbPD2mW YBGP8Ky5cPTzjIv ZERus8MRXpGXzas nYYCr4KgnLRUZEp \
                           3juuuL5RLE5A4qX 6jbmY. END SALTPACK MESSAGE.";

    const RAW_ARMORED: &str = "K1pqnxb2DkrYwTFeoRpTHfQUiQ8VhvQcqV2Ijl5OgvH \
                               QQKXoeeJBRilQ1udqYjHoEWwyIgddRVZSEswTz7nRxd \
                               PdgdRVjkX80hz6eArwGS2IaonQ5sEZH3Ia5qxopd0rW \
                               OSAd4W1MLaAPG3aIif4yUymurJJlPkXjIGfcL3GAOA5 \
                               RIbPD2mWYBGP8Ky5cPTzjIvZERus8MRXpGXzasnYYCr \
                               4KgnLRUZEp3juuuL5RLE5A4qX6jbmY";

    #[test]
    fn armor_known_answer() {
        let armored = armor(INPUT_STRING.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(armored, ARMORED);
    }

    #[test]
    fn raw_armor_known_answer() {
        let options = ArmorOptions::default().with_raw(true);
        let armored = armor(INPUT_STRING.as_bytes(), &options).unwrap();
        assert_eq!(armored, RAW_ARMORED);
    }

    #[test]
    fn round_trip() {
        let decoded = dearmor(ARMORED.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(decoded.data, INPUT_STRING.as_bytes());

        let info = decoded.header_info.unwrap();
        assert_eq!(info.message_type, MessageType::Message);
        assert_eq!(info.app_name, None);
        assert_eq!(decoded.remaining.as_deref(), Some(&b""[..]));
    }

    #[test]
    fn round_trip_in_raw_format() {
        let options = ArmorOptions::default().with_raw(true);
        let decoded = dearmor(RAW_ARMORED.as_bytes(), &options).unwrap();
        assert_eq!(decoded.data, INPUT_STRING.as_bytes());
        assert!(decoded.header_info.is_none());
        assert!(decoded.remaining.is_none());
    }

    #[test]
    fn app_name_and_type_appear_in_framing() {
        let options = ArmorOptions::default()
            .with_message_type(MessageType::EncryptedMessage)
            .with_app_name("KEYBASE");
        let armored = armor(b"hello", &options).unwrap();
        assert!(armored.starts_with("BEGIN KEYBASE SALTPACK ENCRYPTED MESSAGE. "));
        assert!(armored.ends_with(". END KEYBASE SALTPACK ENCRYPTED MESSAGE."));

        let decoded = dearmor(armored.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(
            decoded.header_info,
            Some(ArmorHeaderInfo {
                message_type: MessageType::EncryptedMessage,
                app_name: Some("KEYBASE".into()),
            })
        );
    }

    #[test]
    fn long_input_wraps_every_200_words() {
        let data = vec![0xa5u8; 4096];
        let armored = armor(&data, &ArmorOptions::default()).unwrap();
        let body = armored
            .trim_start_matches("BEGIN SALTPACK MESSAGE. ")
            .trim_end_matches(". END SALTPACK MESSAGE.");
        let first_line = body.lines().next().unwrap();
        assert_eq!(first_line.split(' ').count(), WORDS_PER_LINE);
        assert!(first_line.split(' ').all(|w| w.len() == WORD_LENGTH));

        let decoded = dearmor(armored.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn empty_input() {
        let armored = armor(b"", &ArmorOptions::default()).unwrap();
        assert_eq!(armored, "BEGIN SALTPACK MESSAGE. . END SALTPACK MESSAGE.");
        let decoded = dearmor(armored.as_bytes(), &ArmorOptions::default()).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn quoted_and_rewrapped_armor_still_decodes() {
        let quoted = ARMORED.replace(' ', "\n> ");
        let decoded = dearmor(quoted.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(decoded.data, INPUT_STRING.as_bytes());
    }

    #[test]
    fn text_after_footer_is_remaining() {
        let input = format!("{ARMORED}\nsome trailing text. more");
        let decoded = dearmor(input.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(
            decoded.remaining.as_deref(),
            Some(&b"\nsome trailing text. more"[..])
        );
    }

    #[test]
    fn footer_may_end_at_end_of_input() {
        let input = ARMORED.trim_end_matches('.');
        let decoded = dearmor(input.as_bytes(), &ArmorOptions::default()).unwrap();
        assert_eq!(decoded.data, INPUT_STRING.as_bytes());
        assert_eq!(decoded.remaining.as_deref(), Some(&b""[..]));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let input = ARMORED.replace("BEGIN", "BEGUN");
        let err = dearmor(input.as_bytes(), &ArmorOptions::default()).unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn mismatched_footer_is_rejected() {
        let input = ARMORED.replace("END SALTPACK MESSAGE", "END SALTPACK SIGNED MESSAGE");
        let err = dearmor(input.as_bytes(), &ArmorOptions::default()).unwrap_err();
        assert!(matches!(err, SaltpackError::Format(_)));
        assert!(err.to_string().contains("doesn't match"));

        let input = ARMORED.replace("END SALTPACK", "END KEYBASE SALTPACK");
        assert!(dearmor(input.as_bytes(), &ArmorOptions::default()).is_err());
    }

    #[test]
    fn missing_framing_is_rejected() {
        let err = dearmor(b"no framing here", &ArmorOptions::default()).unwrap_err();
        assert!(err.to_string().contains("valid header and footer"));

        let err = dearmor(b"BEGIN SALTPACK MESSAGE. abc", &ArmorOptions::default()).unwrap_err();
        assert!(err.to_string().contains("footer is missing"));
    }

    #[test]
    fn invalid_body_character_is_rejected() {
        let input = ARMORED.replace("K1pq", "K1p+");
        assert!(matches!(
            dearmor(input.as_bytes(), &ArmorOptions::default()),
            Err(SaltpackError::Format(_))
        ));
    }

    #[test]
    fn base85_is_raw_only() {
        let framed = ArmorOptions {
            alphabet: BASE85,
            ..ArmorOptions::default()
        };
        assert!(matches!(
            armor(b"hello", &framed),
            Err(SaltpackError::Format(_))
        ));

        let raw = framed.with_raw(true);
        let data: Vec<u8> = (0..=255).collect();
        let armored = armor(&data, &raw).unwrap();
        assert_eq!(dearmor(armored.as_bytes(), &raw).unwrap().data, data);
    }

    #[test]
    fn base64_with_shift_round_trips() {
        let options = ArmorOptions {
            alphabet: BASE64,
            shift: true,
            ..ArmorOptions::default()
        };
        let armored = armor(INPUT_STRING.as_bytes(), &options).unwrap();
        let decoded = dearmor(armored.as_bytes(), &options).unwrap();
        assert_eq!(decoded.data, INPUT_STRING.as_bytes());
    }

    #[test]
    fn invalid_app_name_is_rejected() {
        let options = ArmorOptions::default().with_app_name("NOT VALID");
        assert!(armor(b"x", &options).is_err());
    }

    #[test]
    fn options_from_config() {
        let config = ArmorConfig {
            app_name: Some("KEYBASE".into()),
            raw: true,
        };
        let options = ArmorOptions::from(&config);
        assert!(options.raw);
        assert_eq!(options.app_name.as_deref(), Some("KEYBASE"));
        assert_eq!(options.char_block_size(), 43);
    }
}
