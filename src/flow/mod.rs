//! Portal flow - drives one visitor through the gate
//!
//! Owns the [`GateSession`] and the challenge backends, enforcing the
//! ordering rules: a later step's network call is never issued before the
//! prior step's success is observed, failed attempts keep previously
//! captured data, and transport failures never advance the gate.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gate::{GateSession, GateStep};
use crate::nda::{NdaOutcome, NdaService};
use crate::portal::{DocumentEntry, PortalMetadata, PortalResolver, ResolvedPortal};
use crate::types::{GateError, Result};
use crate::verify::{
    OtpCheckOutcome, OtpController, OtpService, PasswordOutcome, PasswordService,
};

/// The challenge backends one flow talks to
#[derive(Clone)]
pub struct GateServices {
    pub password: Arc<dyn PasswordService>,
    pub otp: Arc<dyn OtpService>,
    pub nda: Arc<dyn NdaService>,
}

/// Result of submitting a one-time code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSubmission {
    /// Code verified; the gate advanced to this step
    Verified(GateStep),
    /// Code rejected; the visitor may retry at the same step
    Incorrect,
    /// Code lifetime elapsed; the visitor should request a resend
    Expired,
    /// Code verified, but the implicit grant found the email off the
    /// allow-list; the visitor stays at the otp step
    NotAllowed,
}

/// Terminal exit taken when the visitor declines the NDA. The flow is
/// consumed: declining routes away from the portal, never back a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
    Declined,
}

/// One visitor's passage through the gate for one share link.
///
/// Owned exclusively by that visitor's browsing session; discarded when the
/// session ends. Nothing here is persisted beyond what each verification
/// call independently records server-side.
pub struct PortalFlow {
    flow_id: Uuid,
    session: GateSession,
    metadata: PortalMetadata,
    services: GateServices,
    otp: OtpController,
}

impl std::fmt::Debug for PortalFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalFlow")
            .field("flow_id", &self.flow_id)
            .field("session", &self.session)
            .field("metadata", &self.metadata)
            .field("otp", &self.otp)
            .finish_non_exhaustive()
    }
}

impl PortalFlow {
    /// Resolve a share link and position the flow at the first step.
    ///
    /// Resolution failures ([`GateError::LinkInvalid`],
    /// [`GateError::LinkRevoked`], transport) are fatal: no flow exists
    /// without a full configuration.
    pub async fn open(
        resolver: &dyn PortalResolver,
        link: &str,
        services: GateServices,
        otp_resend_cooldown: Duration,
    ) -> Result<Self> {
        let portal = resolver.resolve(link).await?;
        Ok(Self::from_portal(portal, services, otp_resend_cooldown))
    }

    /// Build a flow from an already-resolved portal
    pub fn from_portal(
        portal: ResolvedPortal,
        services: GateServices,
        otp_resend_cooldown: Duration,
    ) -> Self {
        let session = GateSession::new(&portal.config);
        let flow_id = Uuid::new_v4();
        info!(
            %flow_id,
            sequence = ?session.sequence(),
            "portal flow opened"
        );
        Self {
            flow_id,
            session,
            metadata: portal.metadata,
            services,
            otp: OtpController::new(otp_resend_cooldown),
        }
    }

    /// Unique id for this flow instance, for log correlation
    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// The step the visitor is currently on
    pub fn current_step(&self) -> GateStep {
        self.session.current_step()
    }

    /// The full step sequence for this portal
    pub fn sequence(&self) -> &[GateStep] {
        self.session.sequence()
    }

    /// Captured visitor email, once the email step has been completed
    pub fn visitor_email(&self) -> Option<&str> {
        self.session.visitor_email()
    }

    /// Portal branding and folder metadata (safe to show on the gate itself)
    pub fn metadata(&self) -> &PortalMetadata {
        &self.metadata
    }

    /// The read-only document list. Released only once the terminal `docs`
    /// step is reached; `None` while any verification step remains.
    pub fn documents(&self) -> Option<&[DocumentEntry]> {
        if self.session.at_docs() {
            Some(&self.metadata.documents)
        } else {
            None
        }
    }

    /// Time left before a code resend is allowed, if a cooldown is live
    pub fn otp_cooldown_remaining(&self) -> Option<Duration> {
        self.otp.cooldown_remaining()
    }

    // ------------------------------------------------------------------
    // Step submissions
    // ------------------------------------------------------------------

    /// Capture the visitor's email and advance past the email step
    pub fn submit_email(&mut self, email: &str) -> Result<GateStep> {
        self.require_step(GateStep::Email)?;

        let email = email.trim();
        if !email_is_plausible(email) {
            return Err(GateError::Precondition(
                "a valid email address is required".to_string(),
            ));
        }

        self.session.set_visitor_email(email);
        debug!(flow_id = %self.flow_id, "visitor email captured");
        Ok(self.session.advance())
    }

    /// Issue (or reissue) a one-time code for the captured email.
    ///
    /// Rejected client-side while the resend cooldown is live; a resend
    /// after the cooldown replaces the previous code server-side.
    pub async fn request_code(&mut self) -> Result<()> {
        self.require_step(GateStep::Otp)?;
        let email = self.require_email()?;
        self.otp.issue(self.services.otp.as_ref(), &email).await
    }

    /// Submit a candidate code. The UI calls this as soon as the code is
    /// syntactically complete (see [`crate::verify::code_is_complete`]).
    ///
    /// On verification, if no password step remains in the sequence the
    /// flow performs the elided step's default-success path: a password
    /// grant with an empty password, which the backing service treats as
    /// "password not required". Only a granted result lands on the next
    /// step.
    pub async fn submit_code(&mut self, code: &str) -> Result<CodeSubmission> {
        self.require_step(GateStep::Otp)?;
        let email = self.require_email()?;

        let outcome = self
            .otp
            .check(self.services.otp.as_ref(), &email, code)
            .await?;

        match outcome {
            OtpCheckOutcome::Incorrect => return Ok(CodeSubmission::Incorrect),
            OtpCheckOutcome::Expired => return Ok(CodeSubmission::Expired),
            OtpCheckOutcome::Verified => {}
        }

        if !self.session.step_remains(GateStep::Password) {
            // The password step is elided: auto-invoke its default-success
            // path so verification and grant complete as one compound step.
            match self.services.password.verify(&email, "").await? {
                PasswordOutcome::Granted => {}
                PasswordOutcome::EmailNotAllowed => {
                    warn!(flow_id = %self.flow_id, "implicit grant rejected email");
                    return Ok(CodeSubmission::NotAllowed);
                }
                PasswordOutcome::WrongPassword => {
                    // The service never demands a password it reported as
                    // absent; treat as a protocol fault, do not advance.
                    return Err(GateError::Transport(
                        "verification service demanded a password for a password-less portal"
                            .to_string(),
                    ));
                }
            }
        }

        let step = self.session.advance();
        info!(flow_id = %self.flow_id, step = %step, "one-time code verified");
        Ok(CodeSubmission::Verified(step))
    }

    /// Check the shared password. On [`PasswordOutcome::Granted`] the gate
    /// advances; any rejection leaves the session at the password step with
    /// the captured email intact.
    pub async fn submit_password(&mut self, password: &str) -> Result<PasswordOutcome> {
        self.require_step(GateStep::Password)?;
        let email = self.session.visitor_email().unwrap_or_default().to_string();

        let outcome = self.services.password.verify(&email, password).await?;
        if outcome == PasswordOutcome::Granted {
            let step = self.session.advance();
            info!(flow_id = %self.flow_id, step = %step, "password grant");
        }
        Ok(outcome)
    }

    /// Record the state of the NDA acceptance checkbox
    pub fn set_nda_accepted(&mut self, accepted: bool) {
        self.session.set_nda_accepted(accepted);
    }

    /// Record the visitor's consent. Requires the acceptance flag to be set
    /// first; the call is the one-shot that advances past the `nda` step.
    pub async fn sign_nda(&mut self) -> Result<NdaOutcome> {
        self.require_step(GateStep::Nda)?;

        if !self.session.nda_accepted() {
            return Err(GateError::Precondition(
                "the NDA must be explicitly accepted before signing".to_string(),
            ));
        }

        let email = self.session.visitor_email().unwrap_or_default().to_string();
        if self.services.nda.sign(&email).await? {
            let step = self.session.advance();
            info!(flow_id = %self.flow_id, step = %step, "nda signed");
            Ok(NdaOutcome::Accepted)
        } else {
            Ok(NdaOutcome::Failed)
        }
    }

    /// Decline the NDA. Consumes the flow: the visitor is routed away from
    /// the portal entirely.
    pub fn decline_nda(self) -> FlowExit {
        info!(flow_id = %self.flow_id, "nda declined, leaving portal");
        FlowExit::Declined
    }

    /// Jump back to the email step ("use a different email"). Clears the
    /// captured email and any live code countdown.
    pub fn use_different_email(&mut self) -> Result<GateStep> {
        let step = self.session.reset_to(GateStep::Email)?;
        self.otp.reset();
        debug!(flow_id = %self.flow_id, "restarting from email step");
        Ok(step)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_step(&self, step: GateStep) -> Result<()> {
        let current = self.session.current_step();
        if current != step {
            return Err(GateError::StepOrder(format!(
                "'{step}' submission while the flow is at '{current}'"
            )));
        }
        Ok(())
    }

    fn require_email(&self) -> Result<String> {
        self.session
            .visitor_email()
            .map(str::to_string)
            .ok_or_else(|| {
                GateError::Precondition("an email must be captured before this step".to_string())
            })
    }
}

/// Cheap client-side email shape check. The allow-list decision belongs to
/// the verification service; this only stops obviously unusable input.
fn email_is_plausible(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::{Branding, GateConfig};
    use crate::verify::MemoryOtpService;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticResolver(GateConfig);

    #[async_trait]
    impl PortalResolver for StaticResolver {
        async fn resolve(&self, _link: &str) -> Result<ResolvedPortal> {
            Ok(portal(self.0))
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl PortalResolver for FailingResolver {
        async fn resolve(&self, _link: &str) -> Result<ResolvedPortal> {
            Err(GateError::LinkInvalid)
        }
    }

    /// Scripted password backend recording every call.
    struct ScriptedPasswordService {
        outcome: PasswordOutcome,
        fail_transport: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedPasswordService {
        fn granting() -> Self {
            Self::with(PasswordOutcome::Granted)
        }

        fn with(outcome: PasswordOutcome) -> Self {
            Self {
                outcome,
                fail_transport: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: PasswordOutcome::Granted,
                fail_transport: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PasswordService for ScriptedPasswordService {
        async fn verify(&self, email: &str, password: &str) -> Result<PasswordOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((email.to_string(), password.to_string()));
            if self.fail_transport {
                return Err(GateError::Transport("connection reset".into()));
            }
            Ok(self.outcome)
        }
    }

    struct ScriptedNdaService {
        accept: bool,
        calls: AtomicUsize,
    }

    impl ScriptedNdaService {
        fn accepting() -> Self {
            Self {
                accept: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NdaService for ScriptedNdaService {
        async fn sign(&self, _email: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accept)
        }
    }

    fn portal(config: GateConfig) -> ResolvedPortal {
        ResolvedPortal {
            config,
            metadata: PortalMetadata {
                branding: Branding::default(),
                documents: vec![DocumentEntry {
                    id: "doc-1".into(),
                    name: "Deck.pdf".into(),
                    folder_id: None,
                }],
                folders: vec![],
            },
        }
    }

    fn config(email: bool, otp: bool, password: bool, nda: bool) -> GateConfig {
        GateConfig {
            requires_email: email,
            requires_otp: otp,
            requires_password: password,
            requires_nda: nda,
        }
    }

    fn services(
        password: Arc<ScriptedPasswordService>,
        otp: Arc<MemoryOtpService>,
        nda: Arc<ScriptedNdaService>,
    ) -> GateServices {
        GateServices {
            password,
            otp,
            nda,
        }
    }

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_otp_verification_performs_implicit_grant_to_docs() {
        // {email, otp} and nothing else: no visible password step.
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, true, false, false)),
            services(Arc::clone(&password), Arc::clone(&otp), nda),
            COOLDOWN,
        );

        assert_eq!(
            flow.sequence(),
            &[GateStep::Email, GateStep::Otp, GateStep::Docs]
        );
        assert!(flow.documents().is_none());

        flow.submit_email("a@b.com").unwrap();
        flow.request_code().await.unwrap();
        let code = otp.last_issued_code("a@b.com").unwrap();

        let submission = flow.submit_code(&code).await.unwrap();
        assert_eq!(submission, CodeSubmission::Verified(GateStep::Docs));

        // Exactly one empty-password grant, for the captured email.
        assert_eq!(password.calls(), vec![("a@b.com".to_string(), String::new())]);
        assert!(flow.documents().is_some());
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_step_and_email() {
        let password = Arc::new(ScriptedPasswordService::with(PasswordOutcome::WrongPassword));
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, false, true, true)),
            services(password, otp, nda),
            COOLDOWN,
        );

        assert_eq!(
            flow.sequence(),
            &[
                GateStep::Email,
                GateStep::Password,
                GateStep::Nda,
                GateStep::Docs
            ]
        );

        flow.submit_email("a@b.com").unwrap();
        let outcome = flow.submit_password("nope").await.unwrap();
        assert_eq!(outcome, PasswordOutcome::WrongPassword);

        // Rejection is local to the step: nothing unwinds, nothing is lost.
        assert_eq!(flow.current_step(), GateStep::Password);
        assert_eq!(flow.visitor_email(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_transport_failure_never_advances() {
        let password = Arc::new(ScriptedPasswordService::failing());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, false, true, false)),
            services(password, otp, nda),
            COOLDOWN,
        );

        flow.submit_email("a@b.com").unwrap();
        let err = flow.submit_password("secret").await.unwrap_err();
        assert!(matches!(err, GateError::Transport(_)));
        assert_eq!(flow.current_step(), GateStep::Password);
    }

    #[tokio::test]
    async fn test_full_password_nda_path() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, false, true, true)),
            services(password, otp, Arc::clone(&nda)),
            COOLDOWN,
        );

        flow.submit_email("a@b.com").unwrap();
        assert_eq!(
            flow.submit_password("secret").await.unwrap(),
            PasswordOutcome::Granted
        );
        assert_eq!(flow.current_step(), GateStep::Nda);

        // Signing without the checkbox is rejected before any network call.
        let err = flow.sign_nda().await.unwrap_err();
        assert!(matches!(err, GateError::Precondition(_)));
        assert_eq!(nda.calls.load(Ordering::SeqCst), 0);

        flow.set_nda_accepted(true);
        assert_eq!(flow.sign_nda().await.unwrap(), NdaOutcome::Accepted);
        assert!(flow.documents().is_some());
        assert_eq!(nda.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decline_nda_consumes_the_flow() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(false, false, false, true)),
            services(password, otp, nda),
            COOLDOWN,
        );

        flow.set_nda_accepted(false);
        assert_eq!(flow.decline_nda(), FlowExit::Declined);
    }

    #[tokio::test]
    async fn test_out_of_order_submissions_rejected() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, true, false, false)),
            services(password, otp, nda),
            COOLDOWN,
        );

        // Still at the email step: no code may be requested yet.
        let err = flow.request_code().await.unwrap_err();
        assert!(matches!(err, GateError::StepOrder(_)));

        let err = flow.submit_password("x").await.unwrap_err();
        assert!(matches!(err, GateError::StepOrder(_)));
    }

    #[tokio::test]
    async fn test_use_different_email_resets_and_clears_cooldown() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, true, false, false)),
            services(password, otp, nda),
            COOLDOWN,
        );

        flow.submit_email("a@b.com").unwrap();
        flow.request_code().await.unwrap();
        assert!(flow.otp_cooldown_remaining().is_some());

        let step = flow.use_different_email().unwrap();
        assert_eq!(step, GateStep::Email);
        assert_eq!(flow.visitor_email(), None);
        assert!(flow.otp_cooldown_remaining().is_none());
    }

    #[tokio::test]
    async fn test_malformed_email_rejected() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, false, false, false)),
            services(password, otp, nda),
            COOLDOWN,
        );

        for bad in ["", "no-at-sign", "@domain", "local@", "a b@c.com"] {
            let err = flow.submit_email(bad).unwrap_err();
            assert!(matches!(err, GateError::Precondition(_)), "input {bad:?}");
            assert_eq!(flow.current_step(), GateStep::Email);
        }
    }

    #[tokio::test]
    async fn test_open_propagates_resolution_failure() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());

        let err = PortalFlow::open(
            &FailingResolver,
            "dead-link",
            services(password, otp, nda),
            COOLDOWN,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GateError::LinkInvalid));
    }

    #[tokio::test]
    async fn test_open_resolves_and_positions_at_first_step() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());

        let flow = PortalFlow::open(
            &StaticResolver(config(false, false, false, false)),
            "open-link",
            services(password, otp, nda),
            COOLDOWN,
        )
        .await
        .unwrap();

        // No steps required: the flow opens directly on docs.
        assert_eq!(flow.current_step(), GateStep::Docs);
        assert_eq!(flow.documents().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_elided_grant_refusing_email_stays_at_otp() {
        let password = Arc::new(ScriptedPasswordService::with(
            PasswordOutcome::EmailNotAllowed,
        ));
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, true, false, false)),
            services(password, Arc::clone(&otp), nda),
            COOLDOWN,
        );

        flow.submit_email("a@b.com").unwrap();
        flow.request_code().await.unwrap();
        let code = otp.last_issued_code("a@b.com").unwrap();

        let submission = flow.submit_code(&code).await.unwrap();
        assert_eq!(submission, CodeSubmission::NotAllowed);
        assert_eq!(flow.current_step(), GateStep::Otp);
    }

    #[tokio::test]
    async fn test_verified_with_password_remaining_just_advances() {
        let password = Arc::new(ScriptedPasswordService::granting());
        let otp = Arc::new(MemoryOtpService::new());
        let nda = Arc::new(ScriptedNdaService::accepting());
        let mut flow = PortalFlow::from_portal(
            portal(config(true, true, true, false)),
            services(Arc::clone(&password), Arc::clone(&otp), nda),
            COOLDOWN,
        );

        flow.submit_email("a@b.com").unwrap();
        flow.request_code().await.unwrap();
        let code = otp.last_issued_code("a@b.com").unwrap();

        let submission = flow.submit_code(&code).await.unwrap();
        assert_eq!(submission, CodeSubmission::Verified(GateStep::Password));
        // No implicit grant fired: the visible password step is next.
        assert!(password.calls().is_empty());
    }
}
