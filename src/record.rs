//! Consent record model
//!
//! One canonical shape for a consent document: who it is for, what it covers,
//! and the four signatures collected during sign-off.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConsentError, ConsentResult};

/// The four parties who sign a consent form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    Patient,
    Relative,
    Nurse,
    Doctor,
}

impl SignerRole {
    /// Grid order: patient and relative on the top row, nurse and doctor below
    pub const ALL: [SignerRole; 4] = [
        SignerRole::Patient,
        SignerRole::Relative,
        SignerRole::Nurse,
        SignerRole::Doctor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SignerRole::Patient => "patient",
            SignerRole::Relative => "relative",
            SignerRole::Nurse => "nurse",
            SignerRole::Doctor => "doctor",
        }
    }

    /// Heading printed above the slot in the signature grid
    pub fn slot_title(self) -> &'static str {
        match self {
            SignerRole::Patient => "Patient Signature",
            SignerRole::Relative => "Relative Signature",
            SignerRole::Nurse => "Nurse Signature",
            SignerRole::Doctor => "Doctor Signature",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A captured signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Inline image, `data:image/<format>;base64,<payload>`
    pub data: String,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub signed_at: Option<NaiveDateTime>,
}

impl Signature {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            signed_by: None,
            signed_at: None,
        }
    }

    pub fn by(mut self, signer: impl Into<String>) -> Self {
        self.signed_by = Some(signer.into());
        self
    }

    pub fn at(mut self, when: NaiveDateTime) -> Self {
        self.signed_at = Some(when);
        self
    }

    /// An empty payload counts as not signed
    pub fn is_present(&self) -> bool {
        !self.data.trim().is_empty()
    }
}

/// Signature slots; `None` means not yet signed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureSet {
    pub patient: Option<Signature>,
    pub relative: Option<Signature>,
    pub nurse: Option<Signature>,
    pub doctor: Option<Signature>,
}

impl SignatureSet {
    pub fn get(&self, role: SignerRole) -> Option<&Signature> {
        let slot = match role {
            SignerRole::Patient => &self.patient,
            SignerRole::Relative => &self.relative,
            SignerRole::Nurse => &self.nurse,
            SignerRole::Doctor => &self.doctor,
        };
        slot.as_ref().filter(|sig| sig.is_present())
    }

    pub(crate) fn slot_mut(&mut self, role: SignerRole) -> &mut Option<Signature> {
        match role {
            SignerRole::Patient => &mut self.patient,
            SignerRole::Relative => &mut self.relative,
            SignerRole::Nurse => &mut self.nurse,
            SignerRole::Doctor => &mut self.doctor,
        }
    }

    pub fn is_signed(&self, role: SignerRole) -> bool {
        self.get(role).is_some()
    }
}

/// A consent document and its sign-off progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentRecord {
    pub id: u64,
    pub patient_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub patient_age: String,
    pub patient_mrn: String,
    pub consent_type: String,
    pub consent_required_for: String,
    pub procedure_details: String,
    pub doctor_name: String,
    pub counsellor: Option<String>,
    pub signatory_name: Option<String>,
    pub signatory_relation: Option<String>,
    pub signatory_mobile: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    /// Filename of the stored PDF once one has been generated
    pub output_file: Option<String>,
    pub signatures: SignatureSet,
}

impl ConsentRecord {
    pub fn from_json(json: &str) -> ConsentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the fields a printable consent needs
    pub fn validate(&self) -> ConsentResult<()> {
        let required: [(&'static str, &str); 4] = [
            ("patient_name", &self.patient_name),
            ("patient_age", &self.patient_age),
            ("patient_mrn", &self.patient_mrn),
            ("procedure_details", &self.procedure_details),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConsentError::MissingField(field));
            }
        }
        Ok(())
    }

    /// `MRN_<mrn>_Consent_<id>.pdf`, with the MRN reduced to `[A-Za-z0-9_-]`
    pub fn suggested_filename(&self) -> String {
        let mrn: String = self
            .patient_mrn
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let mrn = if mrn.is_empty() { "UNKNOWN".to_string() } else { mrn };
        format!("MRN_{}_Consent_{}.pdf", mrn, self.id)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Missing,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
        Raw::Missing => String::new(),
    })
}
