//! Session log parsing.
//!
//! Reads the XML written by live-stream recorders:
//!
//! ```xml
//! <i>
//!   <BililiveRecorderRecordInfo roomid="378461" name="host" start_time="2021-01-26T21:01:31.9801837+08:00" />
//!   <d p="30.7448226,1,25,4546550,1611666122726,0,9670369,0" user="viewer">hello</d>
//!   <gift ts="31.2" user="viewer" giftname="flower" giftcount="3" />
//! </i>
//! ```
//!
//! Elements are matched by name at any depth; everything else is skipped.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::colour::Colour;
use crate::event::{ChatEvent, GiftEvent, SessionInfo, SessionLog};

const METADATA_ELEMENT: &[u8] = b"BililiveRecorderRecordInfo";
const CHAT_ELEMENT: &[u8] = b"d";
const GIFT_ELEMENT: &[u8] = b"gift";

/// Length of `YYYY-MM-DDTHH:MM:SS`.
const START_TIME_PREFIX: usize = 19;

/// Minimum number of fields in a chat `p` attribute (timestamp through colour).
const CHAT_FIELDS_REQUIRED: usize = 4;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session log is not valid UTF-8 (first bad byte at offset {offset})")]
    Encoding { offset: usize },
    #[error("XML syntax error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("malformed {record}, attribute `{attribute}`: {reason}")]
    Malformed {
        record: String,
        attribute: &'static str,
        reason: String,
    },
    #[error("session log has no BililiveRecorderRecordInfo element")]
    MissingMetadata,
}

/// Controls which optional records are collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Collect `<gift>` elements. When false they are skipped unparsed.
    pub include_gifts: bool,
}

/// Identifies an element for diagnostics, e.g. `d #12`.
#[derive(Debug, Clone, Copy)]
struct Record {
    element: &'static str,
    ordinal: usize,
}

impl Record {
    fn malformed(self, attribute: &'static str, reason: impl Into<String>) -> ReadError {
        ReadError::Malformed {
            record: self.to_string(),
            attribute,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal == 0 {
            f.write_str(self.element)
        } else {
            write!(f, "{} #{}", self.element, self.ordinal)
        }
    }
}

/// A chat element whose text body is still being read.
#[derive(Debug)]
struct PendingChat {
    timestamp: f64,
    colour: Colour,
    username: String,
    text: String,
}

impl PendingChat {
    fn finish(self) -> ChatEvent {
        ChatEvent {
            timestamp: self.timestamp,
            username: self.username,
            text: self.text,
            colour: self.colour,
        }
    }
}

/// Reads and parses a session log from disk.
///
/// The file name becomes the session title.
pub fn read_session(path: &Path, options: &ReadOptions) -> Result<SessionLog, ReadError> {
    let bytes = fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let title = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read session log");
    parse_session(&bytes, &title, options)
}

/// Parses a session log held in memory.
pub fn parse_session(
    bytes: &[u8],
    title: &str,
    options: &ReadOptions,
) -> Result<SessionLog, ReadError> {
    let content = std::str::from_utf8(bytes).map_err(|e| ReadError::Encoding {
        offset: e.valid_up_to(),
    })?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    let decoder = reader.decoder();

    let mut info: Option<SessionInfo> = None;
    let mut chats = Vec::new();
    let mut gifts = Vec::new();
    let mut pending: Option<PendingChat> = None;
    let mut chat_ordinal = 0;
    let mut gift_ordinal = 0;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(source) => {
                return Err(ReadError::Xml {
                    position: reader.error_position(),
                    source,
                });
            }
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    METADATA_ELEMENT => {
                        if info.is_some() {
                            tracing::warn!("ignoring repeated BililiveRecorderRecordInfo element");
                        } else {
                            info = Some(parse_metadata(e, decoder, title)?);
                        }
                    }
                    CHAT_ELEMENT => {
                        chat_ordinal += 1;
                        let record = Record {
                            element: "d",
                            ordinal: chat_ordinal,
                        };
                        if pending.is_some() {
                            return Err(
                                record.malformed("text", "opened inside another chat element")
                            );
                        }
                        let chat = parse_chat(e, decoder, record)?;
                        if is_empty {
                            chats.push(chat.finish());
                        } else {
                            pending = Some(chat);
                        }
                    }
                    GIFT_ELEMENT if options.include_gifts => {
                        gift_ordinal += 1;
                        let record = Record {
                            element: "gift",
                            ordinal: gift_ordinal,
                        };
                        gifts.push(parse_gift(e, decoder, record)?);
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some(chat) = pending.as_mut() {
                    let text = e.unescape().map_err(|source| ReadError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    chat.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(chat) = pending.as_mut() {
                    chat.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == CHAT_ELEMENT {
                    if let Some(chat) = pending.take() {
                        chats.push(chat.finish());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let info = info.ok_or(ReadError::MissingMetadata)?;
    tracing::debug!(
        chats = chats.len(),
        gifts = gifts.len(),
        room_id = %info.room_id,
        "parsed session log"
    );

    Ok(SessionLog { info, chats, gifts })
}

fn required_attr(
    element: &BytesStart<'_>,
    decoder: Decoder,
    record: Record,
    name: &'static str,
) -> Result<String, ReadError> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| record.malformed(name, e.to_string()))?
        .ok_or_else(|| record.malformed(name, "missing attribute"))?;
    attr.decode_and_unescape_value(decoder)
        .map(Cow::into_owned)
        .map_err(|e| record.malformed(name, e.to_string()))
}

fn parse_timestamp(raw: &str, record: Record, attribute: &'static str) -> Result<f64, ReadError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| record.malformed(attribute, format!("invalid timestamp {raw:?}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(record.malformed(attribute, format!("invalid timestamp {raw:?}")));
    }
    Ok(value)
}

fn parse_metadata(
    element: &BytesStart<'_>,
    decoder: Decoder,
    title: &str,
) -> Result<SessionInfo, ReadError> {
    let record = Record {
        element: "BililiveRecorderRecordInfo",
        ordinal: 0,
    };
    let room_id = required_attr(element, decoder, record, "roomid")?;
    let host_name = required_attr(element, decoder, record, "name")?;
    let raw_start = required_attr(element, decoder, record, "start_time")?;

    Ok(SessionInfo {
        room_id,
        host_name,
        start_time: raw_start.chars().take(START_TIME_PREFIX).collect(),
        started_at: DateTime::parse_from_rfc3339(&raw_start).ok(),
        title: title.to_string(),
    })
}

fn parse_chat(
    element: &BytesStart<'_>,
    decoder: Decoder,
    record: Record,
) -> Result<PendingChat, ReadError> {
    let packed = required_attr(element, decoder, record, "p")?;
    let fields: Vec<&str> = packed.split(',').collect();
    if fields.len() < CHAT_FIELDS_REQUIRED {
        return Err(record.malformed(
            "p",
            format!(
                "expected at least {CHAT_FIELDS_REQUIRED} comma-separated fields, found {}",
                fields.len()
            ),
        ));
    }

    let timestamp = parse_timestamp(fields[0], record, "p")?;
    let colour = fields[3]
        .parse::<Colour>()
        .map_err(|e| record.malformed("p", e.to_string()))?;
    let username = required_attr(element, decoder, record, "user")?;

    Ok(PendingChat {
        timestamp,
        colour,
        username,
        text: String::new(),
    })
}

fn parse_gift(
    element: &BytesStart<'_>,
    decoder: Decoder,
    record: Record,
) -> Result<GiftEvent, ReadError> {
    let timestamp = parse_timestamp(&required_attr(element, decoder, record, "ts")?, record, "ts")?;
    let username = required_attr(element, decoder, record, "user")?;
    let gift_name = required_attr(element, decoder, record, "giftname")?;
    let raw_count = required_attr(element, decoder, record, "giftcount")?;
    let gift_count = raw_count
        .trim()
        .parse()
        .map_err(|_| record.malformed("giftcount", format!("invalid count {raw_count:?}")))?;

    Ok(GiftEvent {
        timestamp,
        username,
        gift_name,
        gift_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<?xml-stylesheet type="text/xsl" href="#s"?>
<i>
<chatserver>chat.bilibili.com</chatserver>
<BililiveRecorder version="1.2.2" />
<BililiveRecorderRecordInfo roomid="21727410" shortid="0" name="肉松owo" title="直播测试" start_time="2021-05-14T20:55:37.1234567+08:00" />
<BililiveRecorderXmlStyle><z:stylesheet xmlns:z="http://www.w3.org/1999/XSL/Transform"><z:template match="/"><table><td>style</td></table></z:template></z:stylesheet></BililiveRecorderXmlStyle>
<d p="1.5,1,25,16777215,1621000000000,0,1001,0" user="alice">hello</d>
<gift ts="2.25" user="bob" uid="1002" giftname="辣条" giftcount="5" />
<d p="3.0,1,25,-1,1621000001000,0,1002,0" user="bob">I &lt;3 this &amp; that</d>
<d p="4.75,1,25,4546550,1621000002000,0,1003,0" user="小明">弹幕<![CDATA[ <raw> ]]>测试</d>
</i>
"##;

    fn parse(xml: &str) -> Result<SessionLog, ReadError> {
        parse_session(xml.as_bytes(), "sample.xml", &ReadOptions::default())
    }

    fn with_chats(chats: &str) -> String {
        format!(
            r#"<i><BililiveRecorderRecordInfo roomid="1" name="host" start_time="2021-01-26T21:01:31.9801837+08:00" />{chats}</i>"#
        )
    }

    fn assert_malformed(err: ReadError, expected_record: &str, expected_attribute: &str) {
        match err {
            ReadError::Malformed {
                record, attribute, ..
            } => {
                assert_eq!(record, expected_record);
                assert_eq!(attribute, expected_attribute);
            }
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_metadata() {
        let log = parse(SAMPLE).unwrap();

        assert_eq!(log.info.room_id, "21727410");
        assert_eq!(log.info.host_name, "肉松owo");
        assert_eq!(log.info.start_time, "2021-05-14T20:55:37");
        assert_eq!(log.info.title, "sample.xml");
        let started_at = log.info.started_at.expect("RFC 3339 start time");
        assert_eq!(started_at.to_rfc3339(), "2021-05-14T20:55:37.123456700+08:00");
    }

    #[test]
    fn test_parses_chats_in_document_order() {
        let log = parse(SAMPLE).unwrap();

        let users: Vec<_> = log.chats.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(users, ["alice", "bob", "小明"]);

        let timestamps: Vec<_> = log.chats.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, [1.5, 3.0, 4.75]);

        assert_eq!(log.chats[0].colour.hex(), "ffffff");
        assert_eq!(log.chats[1].colour.hex(), "ffffff");
        assert_eq!(log.chats[2].colour.hex(), "455ff6");
    }

    #[test]
    fn test_unescapes_entities_and_keeps_cdata() {
        let log = parse(SAMPLE).unwrap();

        assert_eq!(log.chats[1].text, "I <3 this & that");
        assert_eq!(log.chats[2].text, "弹幕 <raw> 测试");
    }

    #[test]
    fn test_gifts_are_skipped_by_default() {
        let log = parse(SAMPLE).unwrap();
        assert!(log.gifts.is_empty());
    }

    #[test]
    fn test_gifts_are_collected_on_request() {
        let options = ReadOptions {
            include_gifts: true,
        };
        let log = parse_session(SAMPLE.as_bytes(), "sample.xml", &options).unwrap();

        assert_eq!(
            log.gifts,
            vec![GiftEvent {
                timestamp: 2.25,
                username: "bob".to_string(),
                gift_name: "辣条".to_string(),
                gift_count: 5,
            }]
        );
        assert_eq!(log.chats.len(), 3);
    }

    #[test]
    fn test_malformed_gifts_are_ignored_when_not_requested() {
        let xml = with_chats(r#"<gift ts="oops" />"#);
        assert!(parse(&xml).is_ok());
    }

    #[test]
    fn test_malformed_gift_is_reported_when_requested() {
        let xml = with_chats(r#"<gift ts="1.0" user="u" giftname="x" giftcount="many" />"#);
        let options = ReadOptions {
            include_gifts: true,
        };
        let err = parse_session(xml.as_bytes(), "t.xml", &options).unwrap_err();
        assert_malformed(err, "gift #1", "giftcount");
    }

    #[test]
    fn test_zero_chats_is_valid() {
        let log = parse(&with_chats("")).unwrap();
        assert!(log.chats.is_empty());
        assert_eq!(log.info.start_time, "2021-01-26T21:01:31");
    }

    #[test]
    fn test_empty_chat_body_yields_empty_text() {
        let xml = with_chats(
            r#"<d p="1,1,25,0" user="a"/><d p="2,1,25,0" user="b"></d><d p="3,1,25,0" user="c">x</d>"#,
        );
        let log = parse(&xml).unwrap();

        let texts: Vec<_> = log.chats.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["", "", "x"]);
    }

    #[test]
    fn test_missing_user_names_the_record() {
        let xml = with_chats(r#"<d p="1,1,25,0" user="a">ok</d><d p="2,1,25,0">no user</d>"#);
        assert_malformed(parse(&xml).unwrap_err(), "d #2", "user");
    }

    #[test]
    fn test_missing_p_is_malformed() {
        let xml = with_chats(r#"<d user="a">text</d>"#);
        assert_malformed(parse(&xml).unwrap_err(), "d #1", "p");
    }

    #[test]
    fn test_short_p_is_malformed() {
        let xml = with_chats(r#"<d p="1.0,1,25" user="a">text</d>"#);
        let err = parse(&xml).unwrap_err();
        assert!(err.to_string().contains("found 3"), "{err}");
        assert_malformed(err, "d #1", "p");
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        for p in ["abc,1,25,0", "-2,1,25,0", "NaN,1,25,0", "inf,1,25,0"] {
            let xml = with_chats(&format!(r#"<d p="{p}" user="a">text</d>"#));
            assert_malformed(parse(&xml).unwrap_err(), "d #1", "p");
        }
    }

    #[test]
    fn test_bad_colour_is_malformed() {
        let xml = with_chats(r#"<d p="1.0,1,25,0xff" user="a">text</d>"#);
        let err = parse(&xml).unwrap_err();
        assert!(err.to_string().contains("invalid colour code"), "{err}");
    }

    #[test]
    fn test_nested_chat_is_malformed() {
        let xml = with_chats(
            r#"<d p="1.0,1,25,0" user="a">outer<d p="2.0,1,25,0" user="b">inner</d></d>"#,
        );
        let err = parse(&xml).unwrap_err();
        assert_malformed(err, "d #2", "text");
    }

    #[test]
    fn test_missing_metadata_is_reported() {
        let err = parse(r#"<i><d p="1,1,25,0" user="a">x</d></i>"#).unwrap_err();
        assert!(matches!(err, ReadError::MissingMetadata));
    }

    #[test]
    fn test_missing_metadata_attribute_is_malformed() {
        let err = parse(r#"<i><BililiveRecorderRecordInfo roomid="1" name="h" /></i>"#).unwrap_err();
        assert_malformed(err, "BililiveRecorderRecordInfo", "start_time");
    }

    #[test]
    fn test_first_metadata_element_wins() {
        let xml = r#"<i>
<BililiveRecorderRecordInfo roomid="1" name="first" start_time="2021-01-01T00:00:00+08:00" />
<BililiveRecorderRecordInfo roomid="2" name="second" start_time="2022-01-01T00:00:00+08:00" />
</i>"#;
        let log = parse(xml).unwrap();
        assert_eq!(log.info.host_name, "first");
    }

    #[test]
    fn test_unparseable_start_time_is_kept_as_prefix() {
        let xml = r#"<i><BililiveRecorderRecordInfo roomid="1" name="h" start_time="2021/01/26 21:01:31 CST" /></i>"#;
        let log = parse(xml).unwrap();
        assert_eq!(log.info.start_time, "2021/01/26 21:01:31");
        assert!(log.info.started_at.is_none());
    }

    #[test]
    fn test_invalid_utf8_is_an_encoding_error() {
        let mut bytes = with_chats(r#"<d p="1,1,25,0" user="a">"#).into_bytes();
        let offset = bytes.len();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b"</d></i>");

        let err = parse_session(&bytes, "t.xml", &ReadOptions::default()).unwrap_err();
        assert!(
            matches!(err, ReadError::Encoding { offset: o } if o == offset),
            "{err:?}"
        );
    }

    #[test]
    fn test_leading_bom_is_accepted() {
        let xml = format!("\u{feff}{}", with_chats(r#"<d p="1,1,25,0" user="a">x</d>"#));
        let log = parse(&xml).unwrap();
        assert_eq!(log.chats.len(), 1);
    }

    #[test]
    fn test_mismatched_tags_are_xml_errors() {
        let xml = with_chats(r#"<d p="1,1,25,0" user="a">x</e>"#);
        let err = parse(&xml).unwrap_err();
        assert!(matches!(err, ReadError::Xml { .. }), "{err:?}");
    }

    #[test]
    fn test_read_session_uses_file_name_as_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("录制-21727410-20210514-205537.xml");
        std::fs::write(&path, SAMPLE).unwrap();

        let log = read_session(&path, &ReadOptions::default()).unwrap();
        assert_eq!(log.info.title, "录制-21727410-20210514-205537.xml");
        assert_eq!(log.chats.len(), 3);
    }

    #[test]
    fn test_read_session_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xml");

        let err = read_session(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
        assert!(err.to_string().contains("missing.xml"));
    }
}
