// caisse/src/monetico/fields.rs

use std::collections::HashMap;

/// Field names whose values, in this order, make up the v3.0 MAC message.
pub const MAC_FIELD_ORDER: [&str; 19] = [
  "TPE",
  "date",
  "montant",
  "reference",
  "texte-libre",
  "version",
  "lgue",
  "societe",
  "mail",
  "nbrech",
  "dateech1",
  "montantech1",
  "dateech2",
  "montantech2",
  "dateech3",
  "montantech3",
  "dateech4",
  "montantech4",
  "options",
];

/// Fields a return must carry before anything else is attempted.
pub const REQUIRED_FIELDS: [&str; 5] = ["code-retour", "reference", "montant", "date", "MAC"];

/// Return codes that mean the payment went through. `payetest` is the
/// sandbox twin of `paiement`.
pub const SUCCESS_CODES: [&str; 2] = ["paiement", "payetest"];

/// Values of an inbound Monetico return, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoneticoFields(HashMap<String, String>);

impl MoneticoFields {
  /// Builds from decoded `key=value` pairs. A repeated key keeps its first
  /// value.
  pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
    let mut map = HashMap::new();
    for (k, v) in pairs {
      map.entry(k).or_insert(v);
    }
    MoneticoFields(map)
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  /// Like [`get`](Self::get), treating blank values as absent.
  pub fn non_empty(&self, name: &str) -> Option<&str> {
    self.get(name).filter(|v| !v.trim().is_empty())
  }

  pub fn reference(&self) -> &str {
    self.get("reference").unwrap_or_default()
  }

  pub fn return_code(&self) -> &str {
    self.get("code-retour").unwrap_or_default()
  }

  pub fn missing_required(&self) -> Vec<String> {
    REQUIRED_FIELDS
      .iter()
      .filter(|name| self.non_empty(name).is_none())
      .map(|name| name.to_string())
      .collect()
  }

  /// Message to authenticate: field values in contract order, each followed
  /// by `*`. Absent fields contribute an empty value.
  pub fn mac_message(&self) -> String {
    mac_message_from(|name| self.get(name))
  }

  pub fn is_success(&self) -> bool {
    SUCCESS_CODES.contains(&self.return_code().trim())
  }
}

/// Builds the MAC message from any field lookup. Shared by inbound
/// verification and outbound form signing.
pub fn mac_message_from<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> String {
  let mut message = String::new();
  for name in MAC_FIELD_ORDER {
    message.push_str(lookup(name).unwrap_or_default());
    message.push('*');
  }
  message
}
