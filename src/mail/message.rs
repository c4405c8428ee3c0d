/// 邮件组装
///
/// 生成纯文本邮件（头部 + 正文），并编码为 Gmail `raw` 字段要求的 base64url
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE},
};

/// 发件人：Gmail 会替换为已授权的账户
const FROM_ME: &str = "me";

/// 每个 encoded-word 承载的最大原始字节数（编码后不超过 75 字符）
const ENCODED_WORD_MAX_BYTES: usize = 45;

/// 超过该长度的 ASCII 文本也编码，以便折行
const MAX_PLAIN_HEADER_LEN: usize = 900;

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(to: &str, subject: &str, body: &str) -> Self {
        Self {
            from: FROM_ME.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    /// 生成完整邮件文本（CRLF 换行）
    pub fn render(&self) -> String {
        let mut mail = String::new();
        for (name, value) in [
            ("From", self.from.clone()),
            ("To", self.to.clone()),
            ("Subject", encode_header_text(&self.subject)),
            ("MIME-Version", "1.0".to_string()),
            ("Content-Type", "text/plain; charset=UTF-8".to_string()),
            ("Content-Transfer-Encoding", "8bit".to_string()),
        ] {
            mail.push_str(name);
            mail.push_str(": ");
            mail.push_str(&value);
            mail.push_str("\r\n");
        }

        mail.push_str("\r\n");
        mail.push_str(&normalize_line_endings(&self.body));
        mail.push_str("\r\n");
        mail
    }

    /// Gmail `users.messages.send` 的 `raw` 字段
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.render().as_bytes())
    }
}

/// 按 RFC 2047 编码头部文本
///
/// 可打印 ASCII 原样保留；其余（非 ASCII、控制字符、CR/LF）编码为
/// `=?UTF-8?B?...?=`，按字符边界拆分，多个 encoded-word 之间折行
pub fn encode_header_text(text: &str) -> String {
    let plain = text.len() <= MAX_PLAIN_HEADER_LEN
        && !text.contains("=?")
        && text.chars().all(|c| (' '..='~').contains(&c));
    if plain {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_MAX_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }

    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes()))
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 解码一个或多个 encoded-word
    fn decode_words(header: &str) -> String {
        let mut bytes = Vec::new();
        for word in header.split("\r\n ") {
            let payload = word
                .strip_prefix("=?UTF-8?B?")
                .and_then(|w| w.strip_suffix("?="))
                .expect("不是 encoded-word");
            bytes.extend(STANDARD.decode(payload).unwrap());
        }
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_ascii_subject_unchanged() {
        assert_eq!(encode_header_text("buy milk"), "buy milk");
        assert_eq!(encode_header_text(""), "");
    }

    #[test]
    fn test_non_ascii_subject_encoded() {
        let encoded = encode_header_text("买牛奶 café");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert_eq!(decode_words(&encoded), "买牛奶 café");
    }

    #[test]
    fn test_crlf_cannot_inject_headers() {
        let encoded = encode_header_text("buy milk\r\nBcc: evil@example.com");
        assert!(!encoded.contains("\r\nBcc"));
        assert_eq!(decode_words(&encoded), "buy milk\r\nBcc: evil@example.com");
    }

    #[test]
    fn test_long_subject_split_into_short_words() {
        let subject = "提醒".repeat(60);
        let encoded = encode_header_text(&subject);

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= 75));
        assert_eq!(decode_words(&encoded), subject);
    }

    #[test]
    fn test_render_headers_and_body() {
        let message = OutboundMessage::new("a@example.com", "buy milk", "line1\nline2");
        let mail = message.render();

        assert!(mail.starts_with("From: me\r\nTo: a@example.com\r\nSubject: buy milk\r\n"));
        assert!(mail.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(mail.ends_with("\r\n\r\nline1\r\nline2\r\n"));
    }

    #[test]
    fn test_empty_body() {
        let mail = OutboundMessage::new("a@example.com", "buy milk", "").render();
        assert!(mail.ends_with("Content-Transfer-Encoding: 8bit\r\n\r\n\r\n"));
    }

    #[test]
    fn test_raw_is_base64url_of_rendered_mail() {
        let message = OutboundMessage::new("a@example.com", "买牛奶?>", "");
        let raw = message.to_raw();

        assert!(!raw.contains('+') && !raw.contains('/'));
        let decoded = URL_SAFE.decode(&raw).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), message.render());
    }
}
