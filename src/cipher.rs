/// The top-level EAMSA 512 cipher handle.
///
/// Owns the block tables, key manager, entropy source, and event bus; all
/// public operations from the embedding contract live here. Construction
/// runs the startup known-answer suite; a failure leaves the handle in a
/// permanent error state where every operation returns `SelfTestFailed`,
/// observable through `health_status`.
///
/// The handle is `Sync`: tables are immutable after startup, the key
/// manager does its own locking, and the entropy source sits behind a
/// single mutex that serializes `fill` calls.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info};
use zeroize::Zeroize;

use crate::crypto::aead::{self, Frame};
use crate::crypto::block::BlockTables;
use crate::crypto::kdf::{self, KeySchedule, MASTER_KEY_LEN, NONCE_LEN};
use crate::crypto::sensitive::SecretBytes32;
use crate::crypto::standard;
use crate::entropy::{EntropySource, HealthStatus};
use crate::error::{CipherError, Result};
use crate::events::{Event, EventBus, EventCategory, EventSeverity, EventSink};
use crate::kat;
use crate::keys::policy::RotationPolicy;
use crate::keys::{KeyManager, KeyMetadata, KeyStore, SoftwareKeyStore};

pub struct Eamsa512 {
    tables: BlockTables,
    keys: KeyManager,
    entropy: Mutex<EntropySource>,
    events: EventBus,
    failed: AtomicBool,
}

impl Eamsa512 {
    /// Create a core with an in-memory key store and the default policy.
    pub fn new() -> Result<Self> {
        Self::with_store(Arc::new(SoftwareKeyStore::new()), RotationPolicy::default())
    }

    /// Create a core over a caller-provided key store (e.g. an HSM-backed
    /// implementation) and policy.
    pub fn with_store(store: Arc<dyn KeyStore>, policy: RotationPolicy) -> Result<Self> {
        let handle = Self {
            tables: BlockTables::new(),
            keys: KeyManager::new(store, policy)?,
            entropy: Mutex::new(EntropySource::new()),
            events: EventBus::new(),
            failed: AtomicBool::new(false),
        };

        if kat::run_startup_tests(&handle.tables).is_err() {
            error!("startup self-test failed; core is permanently disabled");
            handle.failed.store(true, Ordering::SeqCst);
            handle.events.emit(Event::new(
                EventCategory::Security,
                EventSeverity::Critical,
                "self_test_failed",
                "known-answer suite failed at startup",
            ));
        } else {
            info!("startup self-test passed");
        }
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Encryption and decryption
    // ------------------------------------------------------------------

    /// Encrypt under the active key version with a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self
            .fresh_nonce()
            .and_then(|nonce| self.encrypt_inner(plaintext, &nonce));
        self.finish_op("encrypt", &result, |frame| format!("{} byte frame", frame.len()));
        result
    }

    /// Encrypt with a caller-supplied nonce. Intended for tests and
    /// reproducibility; nonce uniqueness per key is the caller's problem.
    pub fn encrypt_with_nonce(&self, plaintext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = match <&[u8; NONCE_LEN]>::try_from(nonce) {
            Ok(nonce) => self.encrypt_inner(plaintext, nonce),
            Err(_) => Err(CipherError::InvalidNonceLength(nonce.len())),
        };
        self.finish_op("encrypt", &result, |frame| format!("{} byte frame", frame.len()));
        result
    }

    /// Decrypt a frame, trying the active version and then rotated versions
    /// in descending age order. Each candidate costs one tag verification.
    pub fn decrypt(&self, frame_bytes: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self.decrypt_unpinned(frame_bytes);
        self.finish_decrypt(&result);
        result
    }

    /// Decrypt under an explicitly selected key version.
    pub fn decrypt_as(&self, frame_bytes: &[u8], version: u32) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self.decrypt_pinned(frame_bytes, version);
        self.finish_decrypt(&result);
        result
    }

    // ------------------------------------------------------------------
    // Key lifecycle
    // ------------------------------------------------------------------

    /// Generate a new master key from the entropy source; the version
    /// starts in Generated and must be activated or rotated in.
    pub fn generate_key(&self) -> Result<u32> {
        self.ensure_ready()?;
        let result = self
            .random_master()
            .and_then(|material| self.keys.import(material));
        self.finish_admin("key_generated", &result, |v| format!("version {v}"));
        result
    }

    pub fn activate(&self, version: u32) -> Result<()> {
        self.ensure_ready()?;
        let result = self.keys.activate(version);
        self.finish_admin("key_activated", &result, |_| format!("version {version}"));
        result
    }

    /// Rotate to a new master key: freshly generated, or caller-supplied
    /// 32-byte material accepted unchanged.
    pub fn rotate(&self, new_key: Option<&[u8]>) -> Result<u32> {
        self.ensure_ready()?;
        let result = match new_key {
            Some(bytes) => SecretBytes32::try_from_slice(bytes),
            None => self.random_master(),
        }
        .and_then(|material| self.keys.rotate(material));
        self.finish_admin("key_rotated", &result, |v| format!("new active version {v}"));
        result
    }

    pub fn destroy(&self, version: u32) -> Result<()> {
        self.ensure_ready()?;
        let result = self.keys.destroy(version);
        self.finish_admin("key_destroyed", &result, |_| format!("version {version}"));
        result
    }

    pub fn get_active_metadata(&self) -> Result<KeyMetadata> {
        self.ensure_ready()?;
        let version = self.keys.active_version()?;
        self.keys.metadata(version)
    }

    /// Metadata for every version. Like `health_status`, this stays
    /// queryable after a self-test failure.
    pub fn list_versions(&self) -> Vec<KeyMetadata> {
        self.keys.list()
    }

    /// Encrypt a version's master key under a caller-supplied backup key,
    /// producing an ordinary frame.
    pub fn backup(&self, version: u32, under_key: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self.backup_inner(version, under_key);
        self.finish_admin("backup_created", &result, |_| format!("version {version}"));
        result
    }

    /// Decrypt a backup frame and rotate to the recovered key.
    pub fn restore(&self, frame_bytes: &[u8], under_key: &[u8]) -> Result<u32> {
        self.ensure_ready()?;
        let result = self.restore_inner(frame_bytes, under_key);
        self.finish_admin("key_restored", &result, |v| format!("new active version {v}"));
        result
    }

    /// Backup with the key derived from a passphrase via Argon2id. The
    /// readiness check runs first so a disabled core does not pay for the
    /// memory-hard derivation.
    pub fn backup_with_passphrase(
        &self,
        version: u32,
        passphrase: &[u8],
        salt: &[u8],
    ) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let key = kdf::derive_backup_key(passphrase, salt)?;
        self.backup(version, key.as_bytes())
    }

    pub fn restore_with_passphrase(
        &self,
        frame_bytes: &[u8],
        passphrase: &[u8],
        salt: &[u8],
    ) -> Result<u32> {
        self.ensure_ready()?;
        let key = kdf::derive_backup_key(passphrase, salt)?;
        self.restore(frame_bytes, key.as_bytes())
    }

    // ------------------------------------------------------------------
    // Recommended-default AEAD (XChaCha20-Poly1305)
    // ------------------------------------------------------------------

    /// Encrypt on the audited standard path. Prefer this for new data; the
    /// EAMSA frame format remains for compatibility.
    pub fn encrypt_standard(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self.encrypt_standard_inner(plaintext, aad);
        self.finish_op("encrypt_standard", &result, |frame| {
            format!("{} byte frame", frame.len())
        });
        result
    }

    pub fn decrypt_standard(&self, frame_bytes: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let result = self.decrypt_standard_inner(frame_bytes, aad);
        self.finish_decrypt(&result);
        result
    }

    // ------------------------------------------------------------------
    // Entropy, policy, events
    // ------------------------------------------------------------------

    pub fn fill_random(&self, dst: &mut [u8]) -> Result<()> {
        self.ensure_ready()?;
        self.fill_entropy(dst)
    }

    /// Self-test state and entropy health, combined.
    pub fn health_status(&self) -> HealthStatus {
        if self.failed.load(Ordering::SeqCst) {
            return HealthStatus::Unhealthy;
        }
        self.entropy
            .lock()
            .expect("entropy lock poisoned")
            .health_status()
    }

    /// Reseed the entropy source; the only recovery from an unhealthy one.
    pub fn reset_entropy(&self) -> Result<()> {
        self.ensure_ready()?;
        self.entropy.lock().expect("entropy lock poisoned").reset();
        self.events.emit(Event::new(
            EventCategory::System,
            EventSeverity::Info,
            "entropy_reset",
            "entropy source reseeded",
        ));
        Ok(())
    }

    /// On-demand Shannon check over `sample_len` bytes of output.
    pub fn run_entropy_check(&self, sample_len: usize) -> Result<f64> {
        self.ensure_ready()?;
        let outcome = self
            .entropy
            .lock()
            .expect("entropy lock poisoned")
            .entropy_check(sample_len);
        if outcome.is_err() {
            self.events.emit(Event::new(
                EventCategory::Security,
                EventSeverity::Critical,
                "entropy_unhealthy",
                "conditioned output failed the entropy check",
            ));
        }
        outcome
    }

    /// The current rotation policy. Like `health_status`, this stays
    /// queryable after a self-test failure.
    pub fn get_policy(&self) -> RotationPolicy {
        self.keys.get_policy()
    }

    pub fn set_policy(&self, policy: RotationPolicy) -> Result<()> {
        self.ensure_ready()?;
        let result = self.keys.set_policy(policy);
        self.finish_admin("policy_updated", &result, |_| "rotation policy replaced".into());
        result
    }

    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        self.events.set_sink(sink);
    }

    pub fn events_dropped(&self) -> u64 {
        self.events.dropped()
    }

    /// Age check over the active version; emits warning/critical events but
    /// never rotates by itself. Callers schedule this on their own timer.
    pub fn run_rotation_sweep(&self) -> Result<()> {
        self.ensure_ready()?;
        for finding in self.keys.sweep() {
            let (severity, kind) = if finding.overdue {
                (EventSeverity::Critical, "rotation_overdue")
            } else {
                (EventSeverity::Warning, "rotation_due")
            };
            self.events.emit(Event::new(
                EventCategory::System,
                severity,
                kind,
                format!(
                    "active version {} is {} days old",
                    finding.version, finding.age_days
                ),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_ready(&self) -> Result<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(CipherError::SelfTestFailed);
        }
        Ok(())
    }

    fn encrypt_inner(&self, plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        let version = self.keys.active_version()?;
        let schedule = self.keys.schedule_for(version, nonce)?;
        let frame = aead::seal(&self.tables, &schedule, plaintext);
        self.keys.record_encrypt(version)?;
        Ok(frame)
    }

    fn decrypt_unpinned(&self, frame_bytes: &[u8]) -> Result<Vec<u8>> {
        let frame = Frame::parse(frame_bytes)?;
        for version in self.keys.decrypt_candidates() {
            let Ok(schedule) = self.keys.schedule_for(version, &frame.nonce) else {
                continue;
            };
            if aead::verify(&schedule, &frame) {
                let plaintext = aead::open(&self.tables, &schedule, &frame)?;
                self.keys.record_decrypt(version)?;
                return Ok(plaintext);
            }
        }
        Err(CipherError::AuthFailure)
    }

    fn decrypt_pinned(&self, frame_bytes: &[u8], version: u32) -> Result<Vec<u8>> {
        let frame = Frame::parse(frame_bytes)?;
        let schedule = self.keys.schedule_for(version, &frame.nonce)?;
        let plaintext = aead::open(&self.tables, &schedule, &frame)?;
        self.keys.record_decrypt(version)?;
        Ok(plaintext)
    }

    fn backup_inner(&self, version: u32, under_key: &[u8]) -> Result<Vec<u8>> {
        let backup_key = SecretBytes32::try_from_slice(under_key)?;
        let material = self.keys.master_material(version)?;
        let nonce = self.fresh_nonce()?;
        let schedule = KeySchedule::derive(&backup_key, &nonce);
        Ok(aead::seal(&self.tables, &schedule, material.as_bytes()))
    }

    fn restore_inner(&self, frame_bytes: &[u8], under_key: &[u8]) -> Result<u32> {
        let backup_key = SecretBytes32::try_from_slice(under_key)?;
        let frame = Frame::parse(frame_bytes)?;
        let schedule = KeySchedule::derive(&backup_key, &frame.nonce);
        let mut recovered = aead::open(&self.tables, &schedule, &frame)?;

        if recovered.len() != MASTER_KEY_LEN {
            let actual = recovered.len();
            recovered.zeroize();
            return Err(CipherError::InvalidKeyLength(actual));
        }
        let material = SecretBytes32::try_from_slice(&recovered)?;
        recovered.zeroize();
        self.keys.rotate(material)
    }

    fn encrypt_standard_inner(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let version = self.keys.active_version()?;
        let key = kdf::derive_standard_key(&self.keys.master_material(version)?);
        let mut nonce = [0u8; standard::NONCE_LEN];
        self.fill_entropy(&mut nonce)?;
        let frame = standard::seal(&key, &nonce, plaintext, aad)?;
        self.keys.record_encrypt(version)?;
        Ok(frame)
    }

    fn decrypt_standard_inner(&self, frame_bytes: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if frame_bytes.len() < standard::NONCE_LEN + standard::TAG_LEN {
            return Err(CipherError::InvalidFrame(format!(
                "{} bytes, minimum is {}",
                frame_bytes.len(),
                standard::NONCE_LEN + standard::TAG_LEN
            )));
        }
        for version in self.keys.decrypt_candidates() {
            let Ok(material) = self.keys.master_material(version) else {
                continue;
            };
            let key = kdf::derive_standard_key(&material);
            if let Ok(plaintext) = standard::open(&key, frame_bytes, aad) {
                self.keys.record_decrypt(version)?;
                return Ok(plaintext);
            }
        }
        Err(CipherError::AuthFailure)
    }

    fn random_master(&self) -> Result<SecretBytes32> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        self.fill_entropy(&mut bytes)?;
        let material = SecretBytes32::from(bytes);
        bytes.zeroize();
        Ok(material)
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        self.fill_entropy(&mut nonce)?;
        Ok(nonce)
    }

    fn fill_entropy(&self, dst: &mut [u8]) -> Result<()> {
        let outcome = self
            .entropy
            .lock()
            .expect("entropy lock poisoned")
            .fill(dst);
        if matches!(&outcome, Err(CipherError::EntropyUnavailable)) {
            self.events.emit(Event::new(
                EventCategory::Security,
                EventSeverity::Critical,
                "entropy_unhealthy",
                "entropy source unavailable",
            ));
        }
        outcome
    }

    /// Emit the per-operation event; events precede the operation's return.
    fn finish_op<T>(
        &self,
        kind: &'static str,
        result: &Result<T>,
        describe: impl Fn(&T) -> String,
    ) {
        match result {
            Ok(value) => self.events.emit(Event::new(
                EventCategory::Operation,
                EventSeverity::Info,
                kind,
                describe(value),
            )),
            Err(error) => self.events.emit(Event::new(
                EventCategory::Operation,
                EventSeverity::Warning,
                kind,
                error.to_string(),
            )),
        }
    }

    fn finish_admin<T>(
        &self,
        kind: &'static str,
        result: &Result<T>,
        describe: impl Fn(&T) -> String,
    ) {
        match result {
            Ok(value) => self.events.emit(Event::new(
                EventCategory::Admin,
                EventSeverity::Info,
                kind,
                describe(value),
            )),
            Err(error) => self.events.emit(Event::new(
                EventCategory::Admin,
                EventSeverity::Warning,
                kind,
                error.to_string(),
            )),
        }
    }

    /// Authentication failures are tamper signals and use the blocking
    /// critical path; every other decrypt failure is an ordinary warning.
    fn finish_decrypt<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => self.events.emit(Event::new(
                EventCategory::Operation,
                EventSeverity::Info,
                "decrypt",
                "frame accepted",
            )),
            Err(CipherError::AuthFailure) => self.events.emit(Event::new(
                EventCategory::Security,
                EventSeverity::Critical,
                "auth_failure",
                "frame rejected",
            )),
            Err(error) => self.events.emit(Event::new(
                EventCategory::Operation,
                EventSeverity::Warning,
                "decrypt",
                error.to_string(),
            )),
        }
    }
}
