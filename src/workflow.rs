//! Sign-off workflow: forward-only state machine over the signature set, and
//! the glue that re-renders and stores the PDF after every signature.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use log::info;
use serde::Serialize;

use crate::artifact::ArtifactStore;
use crate::error::{ConsentError, ConsentResult};
use crate::record::{ConsentRecord, Signature, SignerRole};
use crate::renderer::{ConsentRenderer, RenderedDocument};

/// How far sign-off has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOffState {
    Drafted,
    PatientSigned,
    NurseSigned,
    DoctorSigned,
}

impl SignOffState {
    pub fn is_final(self) -> bool {
        self == SignOffState::DoctorSigned
    }

    pub fn name(self) -> &'static str {
        match self {
            SignOffState::Drafted => "drafted",
            SignOffState::PatientSigned => "patient_signed",
            SignOffState::NurseSigned => "nurse_signed",
            SignOffState::DoctorSigned => "doctor_signed",
        }
    }
}

impl fmt::Display for SignOffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ConsentRecord {
    /// State implied by the signatures present
    pub fn state(&self) -> SignOffState {
        let sigs = &self.signatures;
        if sigs.is_signed(SignerRole::Doctor) {
            SignOffState::DoctorSigned
        } else if sigs.is_signed(SignerRole::Nurse) {
            SignOffState::NurseSigned
        } else if sigs.is_signed(SignerRole::Patient) {
            SignOffState::PatientSigned
        } else {
            SignOffState::Drafted
        }
    }

    /// Record the patient's signature and, optionally, a relative's
    pub fn sign_patient(
        &mut self,
        patient: Signature,
        relative: Option<Signature>,
    ) -> ConsentResult<SignOffState> {
        self.check_slot(SignerRole::Patient, SignOffState::Drafted)?;
        if relative.is_some() && self.signatures.is_signed(SignerRole::Relative) {
            return Err(ConsentError::AlreadySigned(SignerRole::Relative));
        }
        require_payload(&patient, SignerRole::Patient)?;

        self.signatures.patient = Some(stamped(patient));
        if let Some(relative) = relative.filter(Signature::is_present) {
            self.signatures.relative = Some(stamped(relative));
        }
        Ok(self.state())
    }

    /// Record the nurse's signature; `signed_by` must name the nurse
    pub fn sign_nurse(&mut self, signature: Signature) -> ConsentResult<SignOffState> {
        self.check_slot(SignerRole::Nurse, SignOffState::PatientSigned)?;
        require_payload(&signature, SignerRole::Nurse)?;
        require_signer(&signature, "nurse_signed_by")?;
        self.signatures.nurse = Some(stamped(signature));
        Ok(self.state())
    }

    /// Record the doctor's signature; `signed_by` must name the doctor
    pub fn sign_doctor(&mut self, signature: Signature) -> ConsentResult<SignOffState> {
        self.check_slot(SignerRole::Doctor, SignOffState::NurseSigned)?;
        require_payload(&signature, SignerRole::Doctor)?;
        require_signer(&signature, "doctor_signed_by")?;
        self.signatures.doctor = Some(stamped(signature));
        Ok(self.state())
    }

    fn check_slot(&self, role: SignerRole, expected: SignOffState) -> ConsentResult<()> {
        if self.signatures.is_signed(role) {
            return Err(ConsentError::AlreadySigned(role));
        }
        let state = self.state();
        if state != expected {
            return Err(ConsentError::InvalidTransition { state, role });
        }
        Ok(())
    }
}

fn require_payload(signature: &Signature, role: SignerRole) -> ConsentResult<()> {
    if signature.is_present() {
        Ok(())
    } else {
        Err(ConsentError::MissingField(match role {
            SignerRole::Patient => "patient_signature",
            SignerRole::Relative => "relative_signature",
            SignerRole::Nurse => "nurse_signature",
            SignerRole::Doctor => "doctor_signature",
        }))
    }
}

fn require_signer(signature: &Signature, field: &'static str) -> ConsentResult<()> {
    match signature.signed_by.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(()),
        _ => Err(ConsentError::MissingField(field)),
    }
}

fn stamped(mut signature: Signature) -> Signature {
    if signature.signed_at.is_none() {
        signature.signed_at = Some(Local::now().naive_local());
    }
    signature
}

/// Renders and stores the consent PDF as sign-off progresses
pub struct ConsentWorkflow<'a> {
    renderer: &'a ConsentRenderer<'a>,
    store: &'a ArtifactStore,
}

impl<'a> ConsentWorkflow<'a> {
    pub fn new(renderer: &'a ConsentRenderer<'a>, store: &'a ArtifactStore) -> Self {
        Self { renderer, store }
    }

    /// Render the record as it stands, overwrite its stored PDF and remember
    /// the filename on the record
    pub fn publish(&self, record: &mut ConsentRecord) -> ConsentResult<(RenderedDocument, PathBuf)> {
        let document = self.renderer.render(record)?;
        let path = self.store.write(&document.suggested_filename, &document.bytes)?;
        record.output_file = Some(document.suggested_filename.clone());
        info!(
            "Consent {} is {} ({} pages stored at {})",
            record.id,
            record.state(),
            document.page_count,
            path.display()
        );
        Ok((document, path))
    }

    pub fn sign_patient(
        &self,
        record: &mut ConsentRecord,
        patient: Signature,
        relative: Option<Signature>,
    ) -> ConsentResult<(RenderedDocument, PathBuf)> {
        record.sign_patient(patient, relative)?;
        self.publish(record)
    }

    pub fn sign_nurse(
        &self,
        record: &mut ConsentRecord,
        signature: Signature,
    ) -> ConsentResult<(RenderedDocument, PathBuf)> {
        record.sign_nurse(signature)?;
        self.publish(record)
    }

    pub fn sign_doctor(
        &self,
        record: &mut ConsentRecord,
        signature: Signature,
    ) -> ConsentResult<(RenderedDocument, PathBuf)> {
        record.sign_doctor(signature)?;
        self.publish(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::StoreConfig;
    use crate::config::RenderConfig;
    use crate::renderer::SlotOutcome;
    use crate::resources::StaticResourceResolver;
    use crate::test_support::{sample_record, signature_data_uri};

    fn sig() -> Signature {
        Signature::new(signature_data_uri(60, 20))
    }

    #[test]
    fn progresses_forward() {
        let mut record = sample_record();
        assert_eq!(record.state(), SignOffState::Drafted);
        assert_eq!(
            record.sign_patient(sig(), Some(sig())).unwrap(),
            SignOffState::PatientSigned
        );
        assert_eq!(
            record.sign_nurse(sig().by("Mary")).unwrap(),
            SignOffState::NurseSigned
        );
        let state = record.sign_doctor(sig().by("Rao")).unwrap();
        assert_eq!(state, SignOffState::DoctorSigned);
        assert!(state.is_final());
        assert!(record.signatures.doctor.as_ref().unwrap().signed_at.is_some());
    }

    #[test]
    fn doctor_cannot_sign_before_nurse() {
        let mut record = sample_record();
        record.sign_patient(sig(), None).unwrap();
        match record.sign_doctor(sig()) {
            Err(ConsentError::InvalidTransition { state, role }) => {
                assert_eq!(state, SignOffState::PatientSigned);
                assert_eq!(role, SignerRole::Doctor);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(record.signatures.doctor.is_none());
    }

    #[test]
    fn signatures_are_never_replaced() {
        let mut record = sample_record();
        record.sign_patient(sig(), None).unwrap();
        let first = record.signatures.patient.clone();
        assert!(matches!(
            record.sign_patient(sig(), None),
            Err(ConsentError::AlreadySigned(SignerRole::Patient))
        ));
        assert_eq!(record.signatures.patient, first);
    }

    #[test]
    fn empty_signature_is_rejected() {
        let mut record = sample_record();
        assert!(matches!(
            record.sign_patient(Signature::new(""), None),
            Err(ConsentError::MissingField("patient_signature"))
        ));
        assert_eq!(record.state(), SignOffState::Drafted);
    }

    #[test]
    fn staff_signatures_need_a_signer() {
        let mut record = sample_record();
        record.sign_patient(sig(), None).unwrap();
        assert!(matches!(
            record.sign_nurse(sig()),
            Err(ConsentError::MissingField("nurse_signed_by"))
        ));
        assert!(matches!(
            record.sign_nurse(sig().by("   ")),
            Err(ConsentError::MissingField("nurse_signed_by"))
        ));
        assert_eq!(record.state(), SignOffState::PatientSigned);

        record.sign_nurse(sig().by("Mary")).unwrap();
        assert!(matches!(
            record.sign_doctor(sig()),
            Err(ConsentError::MissingField("doctor_signed_by"))
        ));
        assert_eq!(record.state(), SignOffState::NurseSigned);
        assert!(record.signatures.doctor.is_none());
    }

    #[test]
    fn workflow_regenerates_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(StoreConfig {
            output_dir: dir.path().join("consents"),
        });
        let config = RenderConfig::default();
        let resolver = StaticResourceResolver::default();
        let renderer = ConsentRenderer::new(&config, &resolver);
        let workflow = ConsentWorkflow::new(&renderer, &store);

        let mut record = sample_record();
        let (first, path) = workflow.sign_patient(&mut record, sig(), None).unwrap();
        assert_eq!(first.slot(SignerRole::Patient), SlotOutcome::Signed);
        assert_eq!(first.slot(SignerRole::Nurse), SlotOutcome::Pending);
        assert_eq!(record.output_file.as_deref(), Some(first.suggested_filename.as_str()));

        let (second, second_path) = workflow.sign_nurse(&mut record, sig().by("Mary")).unwrap();
        assert_eq!(path, second_path);
        assert_eq!(second.slot(SignerRole::Nurse), SlotOutcome::Signed);
        assert_eq!(std::fs::read(&path).unwrap(), second.bytes);
    }
}
