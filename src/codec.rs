//! Document <-> share link codec.
//!
//! The parameter names below are a public contract: links already shared
//! carry them, so they must never be renamed.

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::model::{
    BankDetails, Document, DocumentType, LineItem, Party, PricingMode, TaxSplit, Visibility,
};

pub const LOGO: &str = "logo";
pub const TITLE: &str = "title";
pub const DATE: &str = "date";
pub const INVOICE_NO: &str = "invoiceNo";
pub const PRICING_MODE: &str = "gstMode";
pub const TAX_SPLIT: &str = "gstSplit";
pub const BILLED_TO_NAME: &str = "btName";
pub const BILLED_TO_ADDRESS: &str = "btAddr";
pub const BILLED_TO_TAX_ID: &str = "btGst";
pub const FROM_NAME: &str = "fName";
pub const FROM_ADDRESS: &str = "fAddr";
pub const FROM_TAX_ID: &str = "fGst";
pub const ITEMS: &str = "items";
pub const BANK_ACCOUNT_NAME: &str = "bAccName";
pub const BANK_NAME: &str = "bBank";
pub const BANK_ACCOUNT_NO: &str = "bAccNo";
pub const BANK_IFSC: &str = "bIfsc";
pub const BANK_ACCOUNT_TYPE: &str = "bAccType";
pub const REGISTRATION_ID: &str = "udyam";
pub const PAYMENT_NOTE: &str = "payment";
pub const DOCUMENT_TYPE: &str = "type";
pub const VISIBILITY: &str = "visibility";

/// Origin used to parse links given without scheme and host.
const LOCAL_ORIGIN: &str = "http://localhost/";

/// Known logo assets and their short link aliases.
const LOGO_ALIASES: &[(&str, &str)] = &[
    ("creo", "/creo-logo.png"),
    ("little", "/Little Things Cute.png"),
    ("artangle90", "/artangle90.png"),
    ("storeeva", "/storeeva.jpg"),
];

pub fn logo_for_alias(alias: &str) -> Option<&'static str> {
    LOGO_ALIASES.iter().find(|(a, _)| *a == alias).map(|(_, path)| *path)
}

pub fn alias_for_logo(path: &str) -> Option<&'static str> {
    LOGO_ALIASES.iter().find(|(_, p)| *p == path).map(|(alias, _)| *alias)
}

pub fn logo_aliases() -> impl Iterator<Item = (&'static str, &'static str)> {
    LOGO_ALIASES.iter().copied()
}

// ==========================================
// Enum wire values
// ==========================================

impl PricingMode {
    pub fn as_param(self) -> &'static str {
        match self {
            PricingMode::Exclusive => "exclusive",
            PricingMode::Inclusive => "inclusive",
        }
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "exclusive" => Some(PricingMode::Exclusive),
            "inclusive" => Some(PricingMode::Inclusive),
            _ => None,
        }
    }
}

impl TaxSplit {
    pub fn as_param(self) -> &'static str {
        match self {
            TaxSplit::Split => "split",
            TaxSplit::Single => "single",
        }
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "split" => Some(TaxSplit::Split),
            "single" => Some(TaxSplit::Single),
            _ => None,
        }
    }
}

impl DocumentType {
    pub fn as_param(self) -> &'static str {
        match self {
            DocumentType::Proforma => "PROFORMA",
            DocumentType::Tax => "TAX",
        }
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "PROFORMA" => Some(DocumentType::Proforma),
            "TAX" => Some(DocumentType::Tax),
            _ => None,
        }
    }
}

// ==========================================
// ParamSet
// ==========================================

/// Ordered, flat string parameters, as carried in a query string.
/// Lookups return the first occurrence of a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    pairs: Vec<(String, String)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Replaces every existing value for `name`, keeping the first position.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == name) {
            Some(idx) => {
                self.pairs[idx].1 = value;
                let mut seen = 0;
                self.pairs.retain(|(k, _)| {
                    if k != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    #[cfg(test)]
    pub fn remove(&mut self, name: &str) {
        self.pairs.retain(|(k, _)| k != name);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reads the query of a full link, a bare `?query`, or a bare query.
    pub fn from_link(link: &str) -> Result<Self, CodecError> {
        let link = link.trim();
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => {
                let relative = if link.starts_with('?') { link.to_string() } else { format!("?{link}") };
                Url::parse(LOCAL_ORIGIN)
                    .and_then(|origin| origin.join(&relative))
                    .map_err(|e| CodecError::Link(e.to_string()))?
            }
        };
        Ok(Self {
            pairs: url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
        })
    }

    /// Form-encoded query string, without the leading `?`.
    pub fn to_query(&self) -> String {
        // `query_pairs_mut` on a throwaway origin is the form encoder.
        match Url::parse(LOCAL_ORIGIN) {
            Ok(mut url) => {
                url.query_pairs_mut().clear().extend_pairs(self.iter());
                url.query().unwrap_or_default().to_string()
            }
            Err(_) => String::new(),
        }
    }

    /// `base` with its query replaced by this parameter set.
    pub fn share_link(&self, base: &str) -> Result<String, CodecError> {
        Ok(self.link_on(&parse_base(base)?))
    }

    pub fn link_on(&self, base: &Url) -> String {
        let mut url = base.clone();
        if self.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&self.to_query()));
        }
        url.to_string()
    }
}

/// Parses the configured base link that share links are built on.
pub fn parse_base(base: &str) -> Result<Url, CodecError> {
    Url::parse(base).map_err(|e| CodecError::Link(format!("{base}: {e}")))
}

/// The base link with any query stripped, as after a reset.
pub fn bare_link(base: &str) -> Result<String, CodecError> {
    ParamSet::new().share_link(base)
}

// ==========================================
// Encode
// ==========================================

pub fn encode(doc: &Document) -> ParamSet {
    let mut params = ParamSet::new();

    let logo = alias_for_logo(&doc.logo_url).unwrap_or(doc.logo_url.as_str());
    params.set(LOGO, logo);
    params.set(TITLE, &doc.title);
    params.set(DATE, &doc.date);
    params.set(INVOICE_NO, &doc.invoice_no);
    params.set(PRICING_MODE, doc.pricing_mode.as_param());
    params.set(TAX_SPLIT, doc.tax_split.as_param());

    params.set(BILLED_TO_NAME, &doc.billed_to.name);
    params.set(BILLED_TO_ADDRESS, &doc.billed_to.address);
    params.set(BILLED_TO_TAX_ID, &doc.billed_to.tax_id);

    params.set(FROM_NAME, &doc.from.name);
    params.set(FROM_ADDRESS, &doc.from.address);
    params.set(FROM_TAX_ID, &doc.from.tax_id);

    // plain structs of strings and numbers always serialize
    params.set(ITEMS, serde_json::to_string(&doc.items).unwrap_or_else(|_| "[]".to_string()));

    params.set(BANK_ACCOUNT_NAME, &doc.bank.account_name);
    params.set(BANK_NAME, &doc.bank.bank_name);
    params.set(BANK_ACCOUNT_NO, &doc.bank.account_no);
    params.set(BANK_IFSC, &doc.bank.ifsc);
    params.set(BANK_ACCOUNT_TYPE, &doc.bank.account_type);

    params.set(REGISTRATION_ID, &doc.registration_id);
    params.set(PAYMENT_NOTE, &doc.payment_note);

    params.set(DOCUMENT_TYPE, doc.document_type.as_param());
    params.set(VISIBILITY, serde_json::to_string(&doc.visibility).unwrap_or_else(|_| "{}".to_string()));

    params
}

// ==========================================
// Decode
// ==========================================

/// Rebuilds a document from link parameters.
///
/// Returns `None` only when `invoiceNo` is absent, meaning the link carries
/// no document. Every other field is taken when present and well formed and
/// otherwise falls back to the default document's value on its own.
pub fn decode(params: &ParamSet) -> Option<Document> {
    let invoice_no = params.get(INVOICE_NO)?.to_string();
    let defaults = Document::default();

    let text = |name: &str, fallback: &str| params.get(name).unwrap_or(fallback).to_string();

    let logo_url = match params.get(LOGO) {
        Some(raw) => logo_for_alias(raw).unwrap_or(raw).to_string(),
        None => defaults.logo_url.clone(),
    };

    let pricing_mode = enum_param(params, PRICING_MODE, PricingMode::from_param)
        .unwrap_or(defaults.pricing_mode);
    let tax_split = enum_param(params, TAX_SPLIT, TaxSplit::from_param).unwrap_or(defaults.tax_split);
    let document_type = enum_param(params, DOCUMENT_TYPE, DocumentType::from_param)
        .unwrap_or(defaults.document_type);

    let items = match params.get(ITEMS) {
        Some(raw) => decode_items(raw).unwrap_or_else(|e| {
            warn!("{e}; using default items");
            defaults.items.clone()
        }),
        None => defaults.items.clone(),
    };

    let visibility = match params.get(VISIBILITY) {
        Some(raw) => merge_visibility(raw, defaults.visibility).unwrap_or_else(|e| {
            warn!("{e}; using default visibility");
            defaults.visibility
        }),
        None => defaults.visibility,
    };

    debug!(items = items.len(), "decoded document from link");

    Some(Document {
        logo_url,
        title: text(TITLE, &defaults.title),
        date: text(DATE, &defaults.date),
        invoice_no,
        pricing_mode,
        tax_split,
        billed_to: Party {
            name: text(BILLED_TO_NAME, &defaults.billed_to.name),
            address: text(BILLED_TO_ADDRESS, &defaults.billed_to.address),
            tax_id: text(BILLED_TO_TAX_ID, &defaults.billed_to.tax_id),
        },
        from: Party {
            name: text(FROM_NAME, &defaults.from.name),
            address: text(FROM_ADDRESS, &defaults.from.address),
            tax_id: text(FROM_TAX_ID, &defaults.from.tax_id),
        },
        items,
        bank: BankDetails {
            account_name: text(BANK_ACCOUNT_NAME, &defaults.bank.account_name),
            bank_name: text(BANK_NAME, &defaults.bank.bank_name),
            account_no: text(BANK_ACCOUNT_NO, &defaults.bank.account_no),
            ifsc: text(BANK_IFSC, &defaults.bank.ifsc),
            account_type: text(BANK_ACCOUNT_TYPE, &defaults.bank.account_type),
        },
        registration_id: text(REGISTRATION_ID, &defaults.registration_id),
        payment_note: text(PAYMENT_NOTE, &defaults.payment_note),
        document_type,
        visibility,
    })
}

/// Convenience for callers holding a link rather than a parameter set.
pub fn decode_link(link: &str) -> Option<Document> {
    match ParamSet::from_link(link) {
        Ok(params) => decode(&params),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

fn enum_param<T>(params: &ParamSet, name: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = params.get(name)?;
    let parsed = parse(raw);
    if parsed.is_none() {
        let e = CodecError::UnknownValue { param: name, value: raw.to_string() };
        warn!("{e}; using default");
    }
    parsed
}

/// All-or-nothing: any bad record rejects the whole list.
fn decode_items(raw: &str) -> Result<Vec<LineItem>, CodecError> {
    let value: Value = serde_json::from_str(raw).map_err(|source| CodecError::Json { param: ITEMS, source })?;
    if !value.is_array() {
        return Err(CodecError::Shape { param: ITEMS, reason: "expected an array".to_string() });
    }
    let items: Vec<LineItem> =
        serde_json::from_value(value).map_err(|source| CodecError::Json { param: ITEMS, source })?;

    for (idx, item) in items.iter().enumerate() {
        if items[..idx].iter().any(|earlier| earlier.id == item.id) {
            return Err(CodecError::Shape {
                param: ITEMS,
                reason: format!("duplicate item id `{}`", item.id),
            });
        }
    }
    Ok(items)
}

/// Field-by-field: each known key holding a bool overrides `base`.
fn merge_visibility(raw: &str, base: Visibility) -> Result<Visibility, CodecError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|source| CodecError::Json { param: VISIBILITY, source })?;
    let Value::Object(flags) = value else {
        return Err(CodecError::Shape { param: VISIBILITY, reason: "expected an object".to_string() });
    };

    // round-trip through the serde names so the wire keys live in one place
    let mut merged = match serde_json::to_value(base) {
        Ok(Value::Object(map)) => map,
        _ => return Ok(base),
    };
    for (key, flag) in flags {
        match (merged.get_mut(&key), flag) {
            (Some(slot), Value::Bool(b)) => *slot = Value::Bool(b),
            (Some(_), other) => warn!("visibility flag `{key}` is not a boolean ({other}); keeping default"),
            (None, _) => debug!("ignoring unknown visibility flag `{key}`"),
        }
    }
    serde_json::from_value(Value::Object(merged)).map_err(|source| CodecError::Json { param: VISIBILITY, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, DEFAULT_LOGO};
    use proptest::prelude::*;

    fn assert_same(a: &Document, b: &Document) {
        let mut left = a.clone();
        let mut right = b.clone();
        assert_eq!(left.items.len(), right.items.len());
        for (l, r) in left.items.iter_mut().zip(right.items.iter_mut()) {
            assert!((l.value - r.value).abs() <= 1e-9 * l.value.abs().max(1.0));
            assert!((l.tax_rate_percent - r.tax_rate_percent).abs() <= 1e-9 * l.tax_rate_percent.abs().max(1.0));
            l.value = r.value;
            l.tax_rate_percent = r.tax_rate_percent;
        }
        assert_eq!(left, right);
    }

    fn sample() -> Document {
        let (doc, id) = Document::default()
            .with_document_type(DocumentType::Tax)
            .with_invoice_no("CE/07/25-26")
            .with_pricing_mode(PricingMode::Inclusive)
            .with_tax_split(TaxSplit::Single)
            .with_visibility(Block::Bank, false)
            .with_new_item();
        let mut item = doc.item(&id).cloned().expect("new item");
        item.description = "Logo design & \"branding\"".to_string();
        item.value = 2500.5;
        item.tax_rate_percent = 5.0;
        doc.with_item(item)
    }

    #[test]
    fn round_trips_through_a_link() {
        let doc = sample();
        let link = encode(&doc).share_link("https://invoices.example.com/invoicegen/").expect("valid base");
        assert!(link.starts_with("https://invoices.example.com/invoicegen/?"));
        let back = decode_link(&link).expect("has invoiceNo");
        assert_same(&doc, &back);
    }

    #[test]
    fn known_logo_encodes_as_alias() {
        let doc = Document::default().with_logo_url("/storeeva.jpg");
        let params = encode(&doc);
        assert_eq!(params.get(LOGO), Some("storeeva"));
        assert_eq!(decode(&params).map(|d| d.logo_url), Some("/storeeva.jpg".to_string()));
    }

    #[test]
    fn custom_logo_encodes_literally() {
        let doc = Document::default().with_logo_url("https://cdn.example.com/brand.png");
        let params = encode(&doc);
        assert_eq!(params.get(LOGO), Some("https://cdn.example.com/brand.png"));
        assert_eq!(decode(&params).map(|d| d.logo_url), Some("https://cdn.example.com/brand.png".to_string()));
    }

    #[test]
    fn empty_logo_means_no_logo_and_absent_means_default() {
        let mut params = encode(&Document::default().with_logo_url(""));
        assert_eq!(decode(&params).map(|d| d.logo_url), Some(String::new()));
        params.remove(LOGO);
        assert_eq!(decode(&params).map(|d| d.logo_url), Some(DEFAULT_LOGO.to_string()));
    }

    #[test]
    fn missing_invoice_no_means_no_document() {
        let mut params = encode(&sample());
        params.remove(INVOICE_NO);
        assert!(decode(&params).is_none());
        assert!(decode(&ParamSet::new()).is_none());
        assert!(decode_link("https://invoices.example.com/").is_none());
    }

    #[test]
    fn invoice_no_alone_gives_default_fields() {
        let params = ParamSet::from_link("?invoiceNo=CE%2F09%2F25-26").expect("query");
        let doc = decode(&params).expect("invoiceNo present");
        let defaults = Document::default();
        assert_eq!(doc.invoice_no, "CE/09/25-26");
        assert_eq!(doc.items, defaults.items);
        assert_eq!(doc.visibility, defaults.visibility);
        assert_eq!(doc.bank, defaults.bank);
    }

    #[test]
    fn corrupt_items_fall_back_without_touching_other_fields() {
        let doc = sample();
        for bad in ["[{not json", "{\"id\":\"1\"}", "[{\"id\":\"1\"}]", "null", "42"] {
            let mut params = encode(&doc);
            params.set(ITEMS, bad);
            let back = decode(&params).expect("invoiceNo present");
            assert_eq!(back.items, Document::default().items, "input {bad}");
            assert_eq!(back.invoice_no, doc.invoice_no);
            assert_eq!(back.pricing_mode, doc.pricing_mode);
            assert_eq!(back.visibility, doc.visibility);
        }
    }

    #[test]
    fn duplicate_item_ids_reject_the_list() {
        let mut params = encode(&sample());
        params.set(
            ITEMS,
            r#"[{"id":"a","description":"x","value":1,"hsn":"","gstRate":18},{"id":"a","description":"y","value":2,"hsn":"","gstRate":18}]"#,
        );
        assert_eq!(decode(&params).map(|d| d.items), Some(Document::default().items));
    }

    #[test]
    fn visibility_merges_per_flag() {
        let mut params = encode(&sample());
        params.set(VISIBILITY, r#"{"logo":false,"bankDetails":"nope","extra":true}"#);
        let vis = decode(&params).map(|d| d.visibility).expect("decoded");
        let defaults = Document::default().visibility;
        assert!(!vis.logo);
        assert_eq!(vis.bank, defaults.bank);
        assert_eq!(vis.title, defaults.title);

        params.set(VISIBILITY, "[true]");
        assert_eq!(decode(&params).map(|d| d.visibility), Some(defaults));
    }

    #[test]
    fn unknown_enum_values_default_individually() {
        let mut params = encode(&sample());
        params.set(PRICING_MODE, "sideways");
        let doc = decode(&params).expect("decoded");
        assert_eq!(doc.pricing_mode, PricingMode::Exclusive);
        assert_eq!(doc.tax_split, TaxSplit::Single);
        assert_eq!(doc.document_type, DocumentType::Tax);
    }

    #[test]
    fn empty_text_is_kept() {
        let doc = sample().with_title("").with_payment_note("");
        let back = decode(&encode(&doc)).expect("decoded");
        assert_eq!(back.title, "");
        assert_eq!(back.payment_note, "");
    }

    #[test]
    fn reads_legacy_links_without_split_param() {
        let mut params = encode(&sample());
        params.remove(TAX_SPLIT);
        assert_eq!(decode(&params).map(|d| d.tax_split), Some(TaxSplit::Split));
    }

    #[test]
    fn bare_link_strips_query() {
        assert_eq!(
            bare_link("https://invoices.example.com/app/?invoiceNo=1").expect("valid"),
            "https://invoices.example.com/app/"
        );
    }

    #[test]
    fn non_finite_values_never_reach_the_link() {
        let (doc, id) = sample().with_new_item();
        let mut item = doc.item(&id).cloned().expect("new item");
        item.description = "Hosting".to_string();
        item.value = "inf".parse().expect("parses as f64");
        let doc = doc.with_item(item);

        let raw_items = encode(&doc).get(ITEMS).map(str::to_string).expect("items encoded");
        assert!(!raw_items.contains("null"));
        let back = decode(&encode(&doc)).expect("invoiceNo present");
        assert_eq!(back.items.len(), 2);
        assert_eq!(back.items[1].id, id);
        assert_eq!(back.items[1].value, 0.0);
    }

    #[test]
    fn empty_item_list_decodes_as_empty() {
        let mut params = encode(&sample());
        params.set(ITEMS, "[]");
        let doc = decode(&params).expect("invoiceNo present");
        assert!(doc.items.is_empty());
    }

    #[test]
    fn param_set_keeps_first_and_replaces_duplicates() {
        let mut params = ParamSet::from_link("a=1&b=2&a=3").expect("query");
        assert_eq!(params.get("a"), Some("1"));
        params.set("a", "9");
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "9"), ("b", "2")]);
    }

    // ------------------------------------------
    // Generated documents
    // ------------------------------------------

    fn text() -> impl Strategy<Value = String> {
        "[ -~\\n\u{00e9}\u{20b9}]{0,24}"
    }

    fn logo() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(vec!["/creo-logo.png", "/Little Things Cute.png", "/artangle90.png", "/storeeva.jpg"])
                .prop_map(str::to_string),
            "https://[a-z]{1,10}\\.example\\.com/[a-z]{1,8}\\.png",
            Just(String::new()),
        ]
    }

    fn item() -> impl Strategy<Value = (String, String, f64, f64)> {
        (text(), "[0-9]{0,8}", 0.0f64..1e9, 0.0f64..100.0)
    }

    fn visibility() -> impl Strategy<Value = Visibility> {
        prop::array::uniform9(any::<bool>()).prop_map(|f| Visibility {
            logo: f[0],
            title: f[1],
            date: f[2],
            invoice_no: f[3],
            billed_to: f[4],
            from: f[5],
            bank: f[6],
            registration_id: f[7],
            payment_note: f[8],
        })
    }

    fn document() -> impl Strategy<Value = Document> {
        (
            (logo(), text(), text(), text(), any::<bool>(), any::<bool>(), any::<bool>()),
            (text(), text(), text(), text(), text(), text()),
            prop::collection::vec(item(), 0..5),
            (text(), text(), text(), text(), text(), text(), text()),
            visibility(),
        )
            .prop_map(|(head, parties, items, tail, visibility)| {
                let (logo_url, title, date, invoice_no, inclusive, single, tax) = head;
                let items = items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, (description, hsn_code, value, tax_rate_percent))| LineItem {
                        id: format!("item-{idx}"),
                        description,
                        value,
                        hsn_code,
                        tax_rate_percent,
                    })
                    .collect();
                Document {
                    logo_url,
                    title,
                    date,
                    invoice_no,
                    pricing_mode: if inclusive { PricingMode::Inclusive } else { PricingMode::Exclusive },
                    tax_split: if single { TaxSplit::Single } else { TaxSplit::Split },
                    billed_to: Party { name: parties.0, address: parties.1, tax_id: parties.2 },
                    from: Party { name: parties.3, address: parties.4, tax_id: parties.5 },
                    items,
                    bank: BankDetails {
                        account_name: tail.0,
                        bank_name: tail.1,
                        account_no: tail.2,
                        ifsc: tail.3,
                        account_type: tail.4,
                    },
                    registration_id: tail.5,
                    payment_note: tail.6,
                    document_type: if tax { DocumentType::Tax } else { DocumentType::Proforma },
                    visibility,
                }
            })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(doc in document()) {
            let params = encode(&doc);
            let back = decode(&params).expect("invoiceNo always encoded");
            assert_same(&doc, &back);

            let via_link = decode_link(&params.share_link("https://invoices.example.com/").expect("valid base"))
                .expect("invoiceNo always encoded");
            assert_same(&doc, &via_link);
        }
    }
}
