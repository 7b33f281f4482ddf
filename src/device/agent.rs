//! Boot, authorize, mount.
//!
//! A single pass either mounts the payload or ends in `AuthFailed` /
//! `MountFailed`. There is no retry. The reconstructed key exists only
//! inside [`DeviceAgent::reconstruct_and_mount`] and is wiped on return.
//!
//! Outcome events (`BOOT_LOCKED`, `AUTH_FAIL`, `MOUNT_OK`, `MOUNT_FAIL`) are
//! sent to every authority on background threads, at most once, and their
//! failures are only logged.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use zeroize::Zeroizing;

use super::client::{AuthorityClient, ClientError};
use super::state_machine::{DeviceState, StateMachine, StateObserver};
use super::DeviceError;
use crate::mac::SigningSecret;
use crate::payload;
use crate::platform::{Clock, SystemClock};
use crate::protocol::{AuthorizationRequest, EventNotification, EventType};
use crate::sharing::{self, KeyShare};
use crate::storage::BlobSource;

/// Orchestrates one device against its two authorities.
pub struct DeviceAgent {
    device_id: String,
    secret: SigningSecret,
    authorities: [Arc<dyn AuthorityClient>; 2],
    blob: Box<dyn BlobSource>,
    clock: Arc<dyn Clock>,
    machine: StateMachine,
    pending_events: Vec<JoinHandle<()>>,
}

impl DeviceAgent {
    /// `primary` holds share A, `secondary` share B.
    pub fn new(
        device_id: &str,
        secret: SigningSecret,
        primary: Arc<dyn AuthorityClient>,
        secondary: Arc<dyn AuthorityClient>,
        blob: Box<dyn BlobSource>,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            secret,
            authorities: [primary, secondary],
            blob,
            clock: Arc::new(SystemClock),
            machine: StateMachine::new(),
            pending_events: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.machine.add_observer(observer);
    }

    pub fn state(&self) -> DeviceState {
        self.machine.state()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Full pass: boot, authorize against both authorities, mount.
    pub fn run(&mut self) -> Result<Zeroizing<Vec<u8>>, DeviceError> {
        self.boot();
        let (share_a, share_b) = self.authorize_all()?;
        self.reconstruct_and_mount(&share_a, &share_b)
    }

    /// Enters `Locked` and announces it.
    pub fn boot(&mut self) {
        self.machine.boot();
        log::info!("BOOT: filesystem locked");
        self.emit(EventType::BootLocked);
    }

    /// Requests both shares concurrently.
    ///
    /// On any refusal, timeout or missing share the agent ends in
    /// `AuthFailed` and no key is ever assembled.
    pub fn authorize_all(&mut self) -> Result<(KeyShare, KeyShare), DeviceError> {
        self.machine.begin_authorizing()?;

        let ts = self.clock.now();
        let device_id = self.device_id.as_str();
        let secret = &self.secret;
        let [primary, secondary] = &self.authorities;

        let (a, b) = thread::scope(|s| {
            let a = s.spawn(|| request_share(device_id, secret, primary.as_ref(), ts));
            let b = s.spawn(|| request_share(device_id, secret, secondary.as_ref(), ts));
            (
                a.join().unwrap_or(Err(ClientError::Transport)),
                b.join().unwrap_or(Err(ClientError::Transport)),
            )
        });

        match (a, b) {
            (Ok(share_a), Ok(share_b)) => Ok((share_a, share_b)),
            (a, b) => {
                for (authority, result) in self.authorities.iter().zip([a.err(), b.err()]) {
                    if let Some(e) = result {
                        log::warn!("AUTH_FAIL: site {}: {}", authority.site_id(), e);
                    }
                }
                self.machine.auth_failed()?;
                self.emit(EventType::AuthFail);
                Err(DeviceError::AuthorizationFailure)
            }
        }
    }

    /// Rebuilds the key, opens the payload and exposes the plaintext.
    ///
    /// A length mismatch, unreadable blob or failed tag check ends in
    /// `MountFailed` and never yields partial plaintext.
    pub fn reconstruct_and_mount(
        &mut self,
        share_a: &KeyShare,
        share_b: &KeyShare,
    ) -> Result<Zeroizing<Vec<u8>>, DeviceError> {
        if self.machine.state() != DeviceState::Authorizing {
            return Err(DeviceError::InvalidState);
        }

        match self.open_payload(share_a, share_b) {
            Ok(plaintext) => {
                self.machine.mounted()?;
                log::info!("MOUNT_OK: secure partition mounted");
                self.emit(EventType::MountOk);
                Ok(plaintext)
            }
            Err(e) => {
                log::warn!("MOUNT_FAIL: {}", e);
                self.machine.mount_failed()?;
                self.emit(EventType::MountFail);
                Err(e)
            }
        }
    }

    fn open_payload(&self, share_a: &KeyShare, share_b: &KeyShare) -> Result<Zeroizing<Vec<u8>>, DeviceError> {
        let key = sharing::reconstruct(share_a, share_b)?;
        let blob = self.blob.load()?;
        Ok(payload::decrypt(&key, &blob)?)
    }

    /// Sends `event` to every authority without waiting for delivery.
    fn emit(&mut self, event: EventType) {
        self.pending_events.retain(|h| !h.is_finished());

        let ts = self.clock.now();
        for authority in &self.authorities {
            let notification =
                match EventNotification::signed(&self.secret, &self.device_id, event, ts, authority.site_id()) {
                    Ok(n) => n,
                    Err(e) => {
                        log::debug!("event {} for site {} not signed: {}", event, authority.site_id(), e);
                        continue;
                    }
                };
            let authority = Arc::clone(authority);
            let spawned = thread::Builder::new()
                .name("duokey-event".into())
                .spawn(move || {
                    if let Err(e) = authority.send_event(&notification) {
                        log::debug!("event {} to site {} dropped: {}", notification.event_type, authority.site_id(), e);
                    }
                });
            match spawned {
                Ok(handle) => self.pending_events.push(handle),
                Err(e) => log::debug!("event {} not dispatched: {}", event, e),
            }
        }
    }

    /// Waits for in-flight event deliveries. Call before process exit if
    /// the final events should get their chance to go out.
    pub fn drain_events(&mut self) {
        for handle in self.pending_events.drain(..) {
            let _ = handle.join();
        }
    }
}

fn request_share(
    device_id: &str,
    secret: &SigningSecret,
    authority: &dyn AuthorityClient,
    ts: i64,
) -> Result<KeyShare, ClientError> {
    let site_id = authority.site_id();
    let request =
        AuthorizationRequest::signed(secret, device_id, ts, site_id).map_err(|_| ClientError::Rejected)?;
    let response = authority.authorize(&request)?;
    let share = response.share().map_err(|_| ClientError::InvalidResponse)?;
    log::info!("AUTH_OK from site {}", site_id);
    Ok(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::entropy::{EntropyError, EntropySource};
    use crate::gateway::Gateway;
    use crate::notify::MemoryNotifier;
    use crate::payload::{ProtectedBlob, SymmetricKey};
    use crate::platform::FixedClock;
    use crate::protocol::{AuthorizationResponse, EventAck};
    use crate::storage::{FileBlob, StorageError};
    use crate::device::client::LocalAuthority;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;
    const PLAINTEXT: &[u8] = b"Smart-City secure payload: logs v1\n";

    struct MockEntropy {
        counter: u8,
    }

    impl EntropySource for MockEntropy {
        fn name(&self) -> &'static str { "Mock" }
        fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
            for b in dest.iter_mut() {
                *b = self.counter;
                self.counter = self.counter.wrapping_mul(5).wrapping_add(17);
            }
            Ok(())
        }
    }

    struct Fixture {
        share_a: KeyShare,
        share_b: KeyShare,
        blob: ProtectedBlob,
    }

    fn fixture(seed: u8) -> Fixture {
        let mut rng = MockEntropy { counter: seed };
        let key = SymmetricKey::generate(&mut rng).unwrap();
        let blob = payload::encrypt(&key, PLAINTEXT, &mut rng).unwrap();
        let (share_a, share_b) = sharing::split(key.as_bytes(), &mut rng).unwrap();
        Fixture { share_a, share_b, blob }
    }

    fn secret() -> SigningSecret {
        SigningSecret::from("s3cret")
    }

    fn gateway(site: &str, share: KeyShare, allowed: &str, notes: Arc<MemoryNotifier>) -> Arc<dyn AuthorityClient> {
        let config = GatewayConfig::new(site, secret()).allow(allowed).with_share(share);
        let gw = Gateway::new(config)
            .with_notifier(notes)
            .with_clock(Arc::new(FixedClock(NOW)));
        Arc::new(LocalAuthority::new(Arc::new(gw)))
    }

    /// Counts loads so tests can prove the payload was never touched.
    struct CountingBlob {
        inner: ProtectedBlob,
        loads: Arc<AtomicUsize>,
    }

    impl BlobSource for CountingBlob {
        fn load(&self) -> Result<ProtectedBlob, StorageError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.clone())
        }
    }

    /// Authority that never answers in time and drops every event.
    struct TimeoutAuthority(&'static str);

    impl AuthorityClient for TimeoutAuthority {
        fn site_id(&self) -> &str {
            self.0
        }
        fn authorize(&self, _: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
            Err(ClientError::Timeout)
        }
        fn send_event(&self, _: &EventNotification) -> Result<EventAck, ClientError> {
            Err(ClientError::Timeout)
        }
    }

    /// Wraps another authority and records every authorization request.
    struct Recording {
        inner: Arc<dyn AuthorityClient>,
        seen: Mutex<Vec<AuthorizationRequest>>,
    }

    impl AuthorityClient for Recording {
        fn site_id(&self) -> &str {
            self.inner.site_id()
        }
        fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
            self.seen.lock().unwrap().push(request.clone());
            self.inner.authorize(request)
        }
        fn send_event(&self, event: &EventNotification) -> Result<EventAck, ClientError> {
            self.inner.send_event(event)
        }
    }

    fn agent(a: Arc<dyn AuthorityClient>, b: Arc<dyn AuthorityClient>, blob: Box<dyn BlobSource>) -> DeviceAgent {
        DeviceAgent::new("esp32-001", secret(), a, b, blob).with_clock(Arc::new(FixedClock(NOW)))
    }

    /// Event types seen by a gateway, sorted: delivery threads race.
    fn event_types(notes: &MemoryNotifier) -> Vec<String> {
        let mut types: Vec<String> = notes
            .messages()
            .iter()
            .filter_map(|m| m.lines().find_map(|l| l.strip_prefix("- type: ")).map(str::to_string))
            .collect();
        types.sort();
        types
    }

    #[test]
    fn test_paired_shares_mount_payload() {
        let fx = fixture(1);
        let notes_a = Arc::new(MemoryNotifier::new());
        let notes_b = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes_a.clone()),
            gateway("B", fx.share_b.clone(), "esp32-001", notes_b.clone()),
            Box::new(fx.blob.clone()),
        );

        let plaintext = agent.run().unwrap();
        assert_eq!(plaintext.as_slice(), PLAINTEXT);
        assert_eq!(agent.state(), DeviceState::Mounted);

        agent.drain_events();
        for notes in [&notes_a, &notes_b] {
            assert_eq!(event_types(notes), vec!["BOOT_LOCKED".to_string(), "MOUNT_OK".to_string()]);
            assert!(notes.messages().iter().any(|m| m.starts_with("AUTH_OK")));
        }
    }

    #[test]
    fn test_device_not_allowed_ends_auth_failed_without_key() {
        let fx = fixture(2);
        let loads = Arc::new(AtomicUsize::new(0));
        let notes_a = Arc::new(MemoryNotifier::new());
        let notes_b = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes_a.clone()),
            gateway("B", fx.share_b.clone(), "someone-else", notes_b.clone()),
            Box::new(CountingBlob { inner: fx.blob.clone(), loads: loads.clone() }),
        );

        assert_eq!(agent.run().unwrap_err(), DeviceError::AuthorizationFailure);
        assert_eq!(agent.state(), DeviceState::AuthFailed);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        agent.drain_events();
        assert!(notes_b.messages().iter().any(|m| m.contains("reason: not allowed")));
        for notes in [&notes_a, &notes_b] {
            assert_eq!(event_types(notes), vec!["AUTH_FAIL".to_string(), "BOOT_LOCKED".to_string()]);
        }
    }

    #[test]
    fn test_unpaired_share_fails_mount() {
        let fx = fixture(3);
        let other = fixture(4);
        let notes_a = Arc::new(MemoryNotifier::new());
        let notes_b = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes_a.clone()),
            gateway("B", other.share_b.clone(), "esp32-001", notes_b.clone()),
            Box::new(fx.blob.clone()),
        );

        assert_eq!(agent.run().unwrap_err(), DeviceError::AuthenticationFailure);
        assert_eq!(agent.state(), DeviceState::MountFailed);

        agent.drain_events();
        for notes in [&notes_a, &notes_b] {
            assert_eq!(event_types(notes), vec!["BOOT_LOCKED".to_string(), "MOUNT_FAIL".to_string()]);
        }
    }

    #[test]
    fn test_length_mismatch_fails_mount() {
        let fx = fixture(5);
        let short = KeyShare::new(vec![0u8; 31]).unwrap();
        let notes = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes.clone()),
            gateway("B", short, "esp32-001", notes.clone()),
            Box::new(fx.blob.clone()),
        );

        assert_eq!(agent.run().unwrap_err(), DeviceError::LengthMismatch);
        assert_eq!(agent.state(), DeviceState::MountFailed);
    }

    #[test]
    fn test_timeout_is_treated_as_rejection() {
        let fx = fixture(6);
        let notes = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes.clone()),
            Arc::new(TimeoutAuthority("B")),
            Box::new(fx.blob.clone()),
        );

        assert_eq!(agent.run().unwrap_err(), DeviceError::AuthorizationFailure);
        assert_eq!(agent.state(), DeviceState::AuthFailed);
    }

    #[test]
    fn test_event_delivery_failures_do_not_block_mount() {
        struct NoEvents(Arc<dyn AuthorityClient>);
        impl AuthorityClient for NoEvents {
            fn site_id(&self) -> &str {
                self.0.site_id()
            }
            fn authorize(&self, r: &AuthorizationRequest) -> Result<AuthorizationResponse, ClientError> {
                self.0.authorize(r)
            }
            fn send_event(&self, _: &EventNotification) -> Result<EventAck, ClientError> {
                Err(ClientError::Transport)
            }
        }

        let fx = fixture(7);
        let notes = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            Arc::new(NoEvents(gateway("A", fx.share_a.clone(), "esp32-001", notes.clone()))),
            Arc::new(NoEvents(gateway("B", fx.share_b.clone(), "esp32-001", notes.clone()))),
            Box::new(fx.blob.clone()),
        );

        assert_eq!(agent.run().unwrap().as_slice(), PLAINTEXT);
        agent.drain_events();
        assert_eq!(agent.state(), DeviceState::Mounted);
    }

    #[test]
    fn test_missing_blob_fails_mount() {
        let fx = fixture(8);
        let dir = tempfile::tempdir().unwrap();
        let notes = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes.clone()),
            gateway("B", fx.share_b.clone(), "esp32-001", notes.clone()),
            Box::new(FileBlob::new(dir.path().join("secure_data.enc"))),
        );

        assert_eq!(agent.run().unwrap_err(), DeviceError::Io(StorageError::NotFound));
        assert_eq!(agent.state(), DeviceState::MountFailed);
    }

    #[test]
    fn test_mount_requires_authorizing_state() {
        let fx = fixture(9);
        let notes = Arc::new(MemoryNotifier::new());
        let mut agent = agent(
            gateway("A", fx.share_a.clone(), "esp32-001", notes.clone()),
            gateway("B", fx.share_b.clone(), "esp32-001", notes.clone()),
            Box::new(fx.blob.clone()),
        );
        agent.boot();
        assert_eq!(
            agent.reconstruct_and_mount(&fx.share_a, &fx.share_b).unwrap_err(),
            DeviceError::InvalidState
        );
        assert_eq!(agent.state(), DeviceState::Locked);
    }

    #[test]
    fn test_captured_request_replays_successfully() {
        let fx = fixture(10);
        let notes = Arc::new(MemoryNotifier::new());
        let gw_a = gateway("A", fx.share_a.clone(), "esp32-001", notes.clone());
        let recorder = Arc::new(Recording {
            inner: gw_a.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let mut agent = agent(
            recorder.clone(),
            gateway("B", fx.share_b.clone(), "esp32-001", notes.clone()),
            Box::new(fx.blob.clone()),
        );
        agent.run().unwrap();

        // No freshness or nonce tracking: the same signed request is honoured again.
        let captured = recorder.seen.lock().unwrap()[0].clone();
        let replayed = gw_a.authorize(&captured).unwrap();
        assert_eq!(replayed.share().unwrap(), fx.share_a);
    }
}
