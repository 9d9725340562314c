//! Bank name / account extraction from free-text invoice remarks.
//!
//! Remarks come in several incompatible layouts, e.g.
//! - `销方开户银行:中国农业银行股份有限公司三明徐碧支行;银行账号:13800101040002394;`
//! - `开户行：中国工商银行深圳分行\n账号：6222024000001234567`
//! - `中国银行北京分行 6225888888888888`
//!
//! Each layout has its own strategy. Strategies run in order and only fill fields
//! that are still empty, so an earlier match is never overridden.

use crate::types::BankInfo;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Common bank names and abbreviations, in lookup order.
const BANK_KEYWORDS: &[&str] = &[
    "银行", "农行", "工行", "建行", "中行", "招行", "交行", "邮储", "农商行", "浦发", "兴业", "中信",
    "光大", "华夏", "民生", "平安",
];

/// A bank name is cut at the first of these.
const BANK_NAME_SEPARATORS: &[char] = &[';', '；', '，', ',', '。', '、'];

const TRAILING_PUNCTUATION: &[char] = &[':', '：', ';', '；'];

const ACCOUNT_LABEL: &str = "账号";

type Strategy = fn(&str, BankInfo) -> BankInfo;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("labelled", labelled),
    ("inline", inline),
    ("split_line", split_line),
    ("keyword", keyword_fallback),
];

fn labelled_bank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:销方开户银行|开户行)[:：]\s*([^;]+?)(?:;|银行账号)").expect("invalid labelled bank regex")
    })
}

fn labelled_account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"银行账号[:：]\s*(\d+)").expect("invalid labelled account regex"))
}

// The optional prefix group never ends on a digit, so the account capture always
// starts at the beginning of a digit run; `(?:\D|$)` closes the run on the right.
fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([\x{4E00}-\x{9FFF}]+银行(?:[^;\n]*?[^;\n\d])?)(\d{16,19})(?:\D|$)")
            .expect("invalid inline regex")
    })
}

fn split_bank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"开户行[:：]\s*([^\n]+)").expect("invalid split bank regex"))
}

fn split_account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"账号[:：]\s*(\d+)").expect("invalid split account regex"))
}

/// Extract bank name and account number from an invoice remarks string.
///
/// Never fails: when nothing is recognized both fields are empty.
pub fn parse_remarks(text: &str) -> BankInfo {
    if text.is_empty() {
        return BankInfo::default();
    }
    let text = normalize_line_endings(text);

    let mut info = BankInfo::default();
    for (name, strategy) in STRATEGIES {
        if info.is_complete() {
            break;
        }
        info = strategy(&text, info);
        debug!(strategy = name, bank = %info.bank_name, account = %info.account_number, "remark strategy applied");
    }

    if !info.bank_name.is_empty() {
        info.bank_name = clean_bank_name(&info.bank_name);
    }
    info
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Account numbers are 16-19 digits; anything else is an invoice number, date, etc.
fn is_account_length(digits: &str) -> bool {
    (16..=19).contains(&digits.chars().count())
}

/// First capture of `re` whose digit run has account length.
fn first_account(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|digits| is_account_length(digits))
        .map(str::to_string)
}

/// `销方开户银行:<name>;银行账号:<digits>` and the `开户行:` short form.
fn labelled(text: &str, mut info: BankInfo) -> BankInfo {
    if info.bank_name.is_empty() {
        if let Some(m) = labelled_bank_re().captures(text).and_then(|c| c.get(1)) {
            info.bank_name = m.as_str().trim().to_string();
        }
    }
    if info.account_number.is_empty() {
        if let Some(account) = first_account(labelled_account_re(), text) {
            info.account_number = account;
        }
    }
    info
}

/// `<...银行...> <digits>` on one line, no labels.
fn inline(text: &str, mut info: BankInfo) -> BankInfo {
    let Some(caps) = inline_re().captures(text) else {
        return info;
    };
    if info.bank_name.is_empty() {
        if let Some(m) = caps.get(1) {
            info.bank_name = m.as_str().trim().to_string();
        }
    }
    if info.account_number.is_empty() {
        if let Some(m) = caps.get(2) {
            info.account_number = m.as_str().to_string();
        }
    }
    info
}

/// `开户行:<name>` and `账号:<digits>` on separate lines.
fn split_line(text: &str, mut info: BankInfo) -> BankInfo {
    if info.bank_name.is_empty() {
        if let Some(m) = split_bank_re().captures(text).and_then(|c| c.get(1)) {
            info.bank_name = m.as_str().trim().to_string();
        }
    }
    if info.account_number.is_empty() {
        if let Some(account) = first_account(split_account_re(), text) {
            info.account_number = account;
        }
    }
    info
}

/// Last resort for the bank name: the first line mentioning a known bank keyword,
/// skipping account-label lines that merely mention a bank.
fn keyword_fallback(text: &str, mut info: BankInfo) -> BankInfo {
    if !info.bank_name.is_empty() {
        return info;
    }
    for keyword in BANK_KEYWORDS {
        if !text.contains(keyword) {
            continue;
        }
        let line = text
            .split('\n')
            .find(|line| line.contains(keyword) && !line.contains(ACCOUNT_LABEL));
        if let Some(line) = line {
            let name = line.trim().replace(&[':', '：'][..], "");
            let name = name.trim();
            if !name.is_empty() {
                info.bank_name = name.to_string();
                break;
            }
        }
    }
    info
}

/// Cut trailing remark text after the bank name and strip stray punctuation.
///
/// A branch name that itself contains a separator (e.g. an address with a comma)
/// is truncated too.
fn clean_bank_name(raw: &str) -> String {
    let head = raw
        .find(BANK_NAME_SEPARATORS)
        .map_or(raw, |idx| &raw[..idx]);
    head.trim()
        .trim_end_matches(TRAILING_PUNCTUATION)
        .trim()
        .to_string()
}
