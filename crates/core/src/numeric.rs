use regex::Regex;
use std::sync::OnceLock;

// Categorical values that show up in numeric columns of campaign exports (budget types,
// bidding strategies, placeholders). Matched case-insensitively on the trimmed token.
const NON_NUMERIC_TOKENS: &[&str] = &[
    "daily",
    "diário",
    "diario",
    "monthly",
    "mensal",
    "lifetime",
    "vitalício",
    "-",
    "--",
    "---",
    "—",
    "n/a",
    "na",
    "nan",
    "null",
    "none",
    "undefined",
    "maximize conversions",
    "maximizar conversões",
    "maximize clicks",
    "maximizar cliques",
    "target cpa",
    "target roas",
    "cpa desejado",
    "roas desejado",
    "manual cpc",
    "cpc manual",
    "lowest cost",
    "menor custo",
];

const CURRENCY_SYMBOLS: &[&str] = &["R$", "US$", "$", "€", "£", "¥"];

/// Decimal-separator convention a token was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// `1.234,56`
    Brazilian,
    /// `1,234.56`
    International,
    /// `2.000`
    ThousandsDot,
    /// `2,000`
    ThousandsComma,
    /// `12,5`
    DecimalComma,
    /// `1234.56`
    Plain,
}

// Order matters: the first grammar that matches wins.
const GRAMMAR: &[(NumberFormat, &str)] = &[
    (NumberFormat::Brazilian, r"^[-+]?\d{1,3}(?:\.\d{3})+,\d+$"),
    (NumberFormat::International, r"^[-+]?\d{1,3}(?:,\d{3})+\.\d+$"),
    (NumberFormat::ThousandsDot, r"^[-+]?\d{1,3}(?:\.\d{3})+$"),
    (NumberFormat::ThousandsComma, r"^[-+]?\d{1,3}(?:,\d{3})+$"),
    (NumberFormat::DecimalComma, r"^[-+]?\d+,\d+$"),
    (NumberFormat::Plain, r"^[-+]?(?:\d+\.?\d*|\.\d+)$"),
];

fn grammar() -> &'static [(NumberFormat, Regex)] {
    static COMPILED: OnceLock<Vec<(NumberFormat, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        GRAMMAR
            .iter()
            .map(|(format, pattern)| {
                let re = Regex::new(pattern).expect("valid numeric pattern");
                (*format, re)
            })
            .collect()
    })
}

impl NumberFormat {
    fn normalize(self, token: &str) -> String {
        match self {
            NumberFormat::Brazilian => token.replace('.', "").replace(',', "."),
            NumberFormat::International | NumberFormat::ThousandsComma => token.replace(',', ""),
            NumberFormat::ThousandsDot => token.replace('.', ""),
            NumberFormat::DecimalComma => token.replace(',', "."),
            NumberFormat::Plain => token.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedNumber {
    pub value: f64,
    pub format: NumberFormat,
    /// The token carried a `%` suffix. The value is reported as written (`12,5%` -> 12.5).
    pub is_percentage: bool,
}

struct Token {
    body: String,
    is_percentage: bool,
}

fn is_denylisted(raw: &str) -> bool {
    let lower = raw.trim().to_lowercase();
    NON_NUMERIC_TOKENS.iter().any(|t| *t == lower)
}

fn strip_quotes(s: &str) -> &str {
    let mut out = s.trim();
    loop {
        let next = out
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| out.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        match next {
            Some(inner) => out = inner.trim(),
            None => return out,
        }
    }
}

fn tokenize(raw: &str) -> Option<Token> {
    if is_denylisted(raw) {
        return None;
    }

    let unquoted = strip_quotes(raw);
    if is_denylisted(unquoted) {
        return None;
    }

    let mut body = unquoted.to_string();
    for symbol in CURRENCY_SYMBOLS {
        body = body.replace(symbol, "");
    }
    body.retain(|c| !c.is_whitespace());

    let is_percentage = body.ends_with('%');
    if is_percentage {
        body.pop();
    }

    if body.is_empty() || body.chars().any(char::is_alphabetic) {
        return None;
    }

    Some(Token {
        body,
        is_percentage,
    })
}

/// Which grammar a raw token falls under, if any.
pub fn classify(raw: &str) -> Option<NumberFormat> {
    let token = tokenize(raw)?;
    classify_body(&token.body)
}

fn classify_body(body: &str) -> Option<NumberFormat> {
    grammar()
        .iter()
        .find(|(_, re)| re.is_match(body))
        .map(|(format, _)| *format)
}

pub fn parse_number(raw: &str) -> Option<ParsedNumber> {
    let token = tokenize(raw)?;
    let format = classify_body(&token.body)?;
    let value = format
        .normalize(&token.body)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())?;

    Some(ParsedNumber {
        value,
        format,
        is_percentage: token.is_percentage,
    })
}

/// Locale-tolerant numeric parse. `None` means the field is intentionally absent.
pub fn parse(raw: &str) -> Option<f64> {
    parse_number(raw).map(|n| n.value)
}

pub fn is_numeric(raw: &str) -> bool {
    parse_number(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brazilian_and_international_agree() {
        assert_eq!(parse("1.234,56"), Some(1234.56));
        assert_eq!(parse("1,234.56"), Some(1234.56));
        assert_eq!(parse("12.345.678,9"), Some(12_345_678.9));
    }

    #[test]
    fn thousands_only_forms() {
        assert_eq!(parse("2.000"), Some(2000.0));
        assert_eq!(parse("2,000"), Some(2000.0));
        assert_eq!(classify("2.000"), Some(NumberFormat::ThousandsDot));
        assert_eq!(classify("2,000"), Some(NumberFormat::ThousandsComma));
    }

    #[test]
    fn plain_and_decimal_comma() {
        assert_eq!(parse("1234.56"), Some(1234.56));
        assert_eq!(parse("12,5"), Some(12.5));
        assert_eq!(parse("0.75"), Some(0.75));
        assert_eq!(parse("-3"), Some(-3.0));
        assert_eq!(classify("12,5"), Some(NumberFormat::DecimalComma));
    }

    #[test]
    fn strips_currency_quotes_and_whitespace() {
        assert_eq!(parse("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse("\"US$ 99.90\""), Some(99.9));
        assert_eq!(parse("  '€ 10'  "), Some(10.0));
        assert_eq!(parse("R$\u{a0}5,00"), Some(5.0));
    }

    #[test]
    fn denylisted_tokens_are_absent() {
        assert_eq!(parse("Diário"), None);
        assert_eq!(parse("--"), None);
        assert_eq!(parse("N/A"), None);
        assert_eq!(parse("\"daily\""), None);
        assert_eq!(parse("Maximize Conversions"), None);
        assert!(!is_numeric("-"));
    }

    #[test]
    fn letters_reject_the_token() {
        assert_eq!(parse("12abc"), None);
        assert_eq!(parse("1.5k"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("1.2.3,4,5"), None);
    }

    #[test]
    fn percentage_is_flagged_not_rescaled() {
        let n = parse_number("12,5%").unwrap();
        assert_eq!(n.value, 12.5);
        assert!(n.is_percentage);

        let n = parse_number("3.2").unwrap();
        assert!(!n.is_percentage);
        assert_eq!(parse("45%"), Some(45.0));
    }
}
