/// Key lifecycle management.
///
/// The manager exclusively owns every key version and its material.
/// Versions move through Generated -> Active -> Rotated -> Archived ->
/// Destroyed; exactly one version is Active at a time, Rotated versions
/// retain material for decryption only, and Archived/Destroyed versions
/// have their material securely erased before the state flag changes.
///
/// Locking follows the map-then-version order: the version map sits behind
/// a readers-writer lock, each version behind its own mutex acquired after
/// the map lock. The map lock is never held across cryptographic work.
pub mod policy;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::crypto::hash;
use crate::crypto::kdf::KeySchedule;
use crate::crypto::sensitive::SecretBytes32;
use crate::error::{CipherError, Result};
use self::policy::{DestructionMethod, RotationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Generated,
    Active,
    Rotated,
    Archived,
    Destroyed,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyState::Generated => "generated",
            KeyState::Active => "active",
            KeyState::Rotated => "rotated",
            KeyState::Archived => "archived",
            KeyState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Custody backend for master-key material. The in-memory
/// `SoftwareKeyStore` is the default; an HSM driver implements the same
/// interface externally.
pub trait KeyStore: Send + Sync {
    fn store(&self, version: u32, material: &SecretBytes32) -> Result<()>;
    fn fetch(&self, version: u32) -> Result<SecretBytes32>;
    fn erase(&self, version: u32, method: DestructionMethod, passes: u32) -> Result<()>;
}

struct StoreEntry {
    material: SecretBytes32,
    erased: bool,
}

/// In-memory key store with zeroizing erase.
pub struct SoftwareKeyStore {
    entries: Mutex<BTreeMap<u32, StoreEntry>>,
    scrub_counter: AtomicU64,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            scrub_counter: AtomicU64::new(0),
        }
    }

    /// Test hook: the raw bytes currently held for a version, if any.
    pub fn raw_material(&self, version: u32) -> Option<[u8; 32]> {
        self.entries
            .lock()
            .expect("key store lock poisoned")
            .get(&version)
            .map(|entry| *entry.material.as_bytes())
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for SoftwareKeyStore {
    fn store(&self, version: u32, material: &SecretBytes32) -> Result<()> {
        let mut entries = self.entries.lock().expect("key store lock poisoned");
        if entries.contains_key(&version) {
            return Err(CipherError::KeyStateInvalid(format!(
                "version {version} already has stored material"
            )));
        }
        entries.insert(
            version,
            StoreEntry {
                material: material.clone(),
                erased: false,
            },
        );
        Ok(())
    }

    fn fetch(&self, version: u32) -> Result<SecretBytes32> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        let entry = entries
            .get(&version)
            .ok_or(CipherError::KeyNotFound(version))?;
        if entry.erased {
            return Err(CipherError::KeyStateInvalid(format!(
                "material for version {version} has been erased"
            )));
        }
        Ok(entry.material.clone())
    }

    fn erase(&self, version: u32, method: DestructionMethod, passes: u32) -> Result<()> {
        let mut entries = self.entries.lock().expect("key store lock poisoned");
        let entry = entries
            .get_mut(&version)
            .ok_or(CipherError::KeyNotFound(version))?;
        let counter = self.scrub_counter.fetch_add(1, Ordering::Relaxed);
        match method {
            DestructionMethod::Zero => entry.material.scrub(0, counter),
            DestructionMethod::RandomOverwrite => entry.material.scrub(passes, counter),
        }
        entry.erased = true;
        Ok(())
    }
}

struct KeyVersion {
    version: u32,
    state: KeyState,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    rotated_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    destroyed_at: Option<DateTime<Utc>>,
    fingerprint: [u8; hash::FINGERPRINT_LEN],
    enc_counter: u64,
    dec_counter: u64,
    /// One-entry schedule cache keyed by the last nonce seen.
    schedule_cache: Option<KeySchedule>,
}

impl KeyVersion {
    fn new(version: u32, fingerprint: [u8; hash::FINGERPRINT_LEN]) -> Self {
        Self {
            version,
            state: KeyState::Generated,
            created_at: Utc::now(),
            activated_at: None,
            rotated_at: None,
            archived_at: None,
            destroyed_at: None,
            fingerprint,
            enc_counter: 0,
            dec_counter: 0,
            schedule_cache: None,
        }
    }

    fn metadata(&self) -> KeyMetadata {
        KeyMetadata {
            version: self.version,
            state: self.state,
            created_at: self.created_at,
            activated_at: self.activated_at,
            rotated_at: self.rotated_at,
            archived_at: self.archived_at,
            destroyed_at: self.destroyed_at,
            key_hash: hex::encode(self.fingerprint),
            enc_counter: self.enc_counter,
            dec_counter: self.dec_counter,
        }
    }
}

/// Public, serializable view of a key version.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMetadata {
    pub version: u32,
    pub state: KeyState,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub destroyed_at: Option<DateTime<Utc>>,
    /// Hex of the first 16 bytes of SHA3-512(master key).
    pub key_hash: String,
    pub enc_counter: u64,
    pub dec_counter: u64,
}

/// Raised by the background sweep when the active key ages past the policy
/// thresholds. The sweep only reports; rotation stays caller-initiated.
#[derive(Debug, Clone)]
pub struct SweepFinding {
    pub version: u32,
    pub age_days: i64,
    pub overdue: bool,
}

pub struct KeyManager {
    versions: RwLock<BTreeMap<u32, Arc<Mutex<KeyVersion>>>>,
    store: Arc<dyn KeyStore>,
    policy: RwLock<RotationPolicy>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>, policy: RotationPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            versions: RwLock::new(BTreeMap::new()),
            store,
            policy: RwLock::new(policy),
        })
    }

    /// Register externally produced or generated material as a new
    /// Generated version. The stored record is read back and checked by
    /// SHA3-512 equality to guard against bit errors.
    pub fn import(&self, material: SecretBytes32) -> Result<u32> {
        let mut versions = self.versions.write().expect("version map lock poisoned");
        self.insert_version_locked(&mut versions, material)
    }

    /// Promote a Generated version to Active. Fails while another version
    /// is Active; replacing an active key is `rotate`'s job.
    pub fn activate(&self, version: u32) -> Result<()> {
        let versions = self.versions.write().expect("version map lock poisoned");

        for (&other, entry) in versions.iter() {
            if other != version
                && entry.lock().expect("key version lock poisoned").state == KeyState::Active
            {
                return Err(CipherError::KeyStateInvalid(format!(
                    "version {other} is already active; rotate instead"
                )));
            }
        }

        let entry = versions
            .get(&version)
            .ok_or(CipherError::KeyNotFound(version))?;
        let mut guard = entry.lock().expect("key version lock poisoned");
        if guard.state != KeyState::Generated {
            return Err(CipherError::KeyStateInvalid(format!(
                "version {version} is {}, expected generated",
                guard.state
            )));
        }
        guard.state = KeyState::Active;
        guard.activated_at = Some(Utc::now());
        info!(version, "key version activated");
        Ok(())
    }

    /// Atomically demote the active version to Rotated and promote a new
    /// version carrying `material` to Active, then archive any retention
    /// overflow. Gated by the policy's minimum age.
    pub fn rotate(&self, material: SecretBytes32) -> Result<u32> {
        let policy = self.get_policy();
        let mut versions = self.versions.write().expect("version map lock poisoned");

        let active = Self::find_active_locked(&versions)
            .ok_or_else(|| CipherError::KeyStateInvalid("no active key version".into()))?;

        {
            let guard = versions[&active].lock().expect("key version lock poisoned");
            let activated_at = guard.activated_at.unwrap_or(guard.created_at);
            let age_days = Utc::now().signed_duration_since(activated_at).num_days();
            if age_days < policy.min_age_days as i64 {
                return Err(CipherError::RotationTooSoon {
                    age_days,
                    min_days: policy.min_age_days,
                });
            }
        }

        let new_version = self.insert_version_locked(&mut versions, material)?;

        let now = Utc::now();
        {
            let mut old = versions[&active].lock().expect("key version lock poisoned");
            old.state = KeyState::Rotated;
            old.rotated_at = Some(now);
        }
        {
            let mut fresh = versions[&new_version]
                .lock()
                .expect("key version lock poisoned");
            fresh.state = KeyState::Active;
            fresh.activated_at = Some(now);
        }
        info!(from = active, to = new_version, "key rotated");

        self.archive_overflow_locked(&versions, &policy)?;
        Ok(new_version)
    }

    /// Destroy a non-active version: securely erase its material and
    /// derived schedules, then mark it Destroyed.
    pub fn destroy(&self, version: u32) -> Result<()> {
        let policy = self.get_policy();
        let versions = self.versions.write().expect("version map lock poisoned");
        let entry = versions
            .get(&version)
            .ok_or(CipherError::KeyNotFound(version))?;
        let mut guard = entry.lock().expect("key version lock poisoned");

        match guard.state {
            KeyState::Active => {
                return Err(CipherError::KeyStateInvalid(format!(
                    "version {version} is active; rotate before destroying"
                )));
            }
            KeyState::Destroyed => {
                return Err(CipherError::KeyStateInvalid(format!(
                    "version {version} is already destroyed"
                )));
            }
            // Archived material was erased when it left retention.
            KeyState::Archived => {}
            KeyState::Generated | KeyState::Rotated => {
                self.store.erase(
                    version,
                    policy.destruction_method,
                    policy.destruction_passes,
                )?;
            }
        }

        guard.schedule_cache = None;
        guard.state = KeyState::Destroyed;
        guard.destroyed_at = Some(Utc::now());
        info!(version, "key version destroyed");
        Ok(())
    }

    pub fn active_version(&self) -> Result<u32> {
        let versions = self.versions.read().expect("version map lock poisoned");
        Self::find_active_locked(&versions)
            .ok_or_else(|| CipherError::KeyStateInvalid("no active key version".into()))
    }

    /// Versions eligible for unpinned decryption: the active version first,
    /// then rotated versions in descending age order.
    pub fn decrypt_candidates(&self) -> Vec<u32> {
        let versions = self.versions.read().expect("version map lock poisoned");
        let mut candidates = Vec::new();
        if let Some(active) = Self::find_active_locked(&versions) {
            candidates.push(active);
        }
        for (&version, entry) in versions.iter() {
            if entry.lock().expect("key version lock poisoned").state == KeyState::Rotated {
                candidates.push(version);
            }
        }
        candidates
    }

    /// Derive (or reuse from the per-version cache) the schedule for a
    /// nonce. Fails with KeyStateInvalid once the material is gone.
    pub fn schedule_for(&self, version: u32, nonce: &[u8; 16]) -> Result<KeySchedule> {
        let entry = self.version_entry(version)?;
        let mut guard = entry.lock().expect("key version lock poisoned");

        if matches!(guard.state, KeyState::Archived | KeyState::Destroyed) {
            return Err(CipherError::KeyStateInvalid(format!(
                "material for version {version} is not available in state {}",
                guard.state
            )));
        }

        if let Some(cached) = guard.schedule_cache.as_ref() {
            if cached.nonce == *nonce {
                return Ok(cached.clone());
            }
        }

        let material = self.store.fetch(version)?;
        let schedule = KeySchedule::derive(&material, nonce);
        guard.schedule_cache = Some(schedule.clone());
        Ok(schedule)
    }

    /// Master-key material for backup or derived-key use. Unavailable once
    /// the version's material has been erased.
    pub fn master_material(&self, version: u32) -> Result<SecretBytes32> {
        let entry = self.version_entry(version)?;
        let guard = entry.lock().expect("key version lock poisoned");
        if matches!(guard.state, KeyState::Archived | KeyState::Destroyed) {
            return Err(CipherError::KeyStateInvalid(format!(
                "material for version {version} is not available in state {}",
                guard.state
            )));
        }
        self.store.fetch(version)
    }

    pub fn record_encrypt(&self, version: u32) -> Result<()> {
        let entry = self.version_entry(version)?;
        entry.lock().expect("key version lock poisoned").enc_counter += 1;
        Ok(())
    }

    pub fn record_decrypt(&self, version: u32) -> Result<()> {
        let entry = self.version_entry(version)?;
        entry.lock().expect("key version lock poisoned").dec_counter += 1;
        Ok(())
    }

    pub fn metadata(&self, version: u32) -> Result<KeyMetadata> {
        let entry = self.version_entry(version)?;
        let guard = entry.lock().expect("key version lock poisoned");
        Ok(guard.metadata())
    }

    pub fn list(&self) -> Vec<KeyMetadata> {
        let versions = self.versions.read().expect("version map lock poisoned");
        versions
            .values()
            .map(|entry| entry.lock().expect("key version lock poisoned").metadata())
            .collect()
    }

    pub fn get_policy(&self) -> RotationPolicy {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    pub fn set_policy(&self, policy: RotationPolicy) -> Result<()> {
        policy.validate()?;
        *self.policy.write().expect("policy lock poisoned") = policy;
        Ok(())
    }

    /// Age check for the background sweep. Only reports; it never rotates.
    pub fn sweep(&self) -> Vec<SweepFinding> {
        let policy = self.get_policy();
        let versions = self.versions.read().expect("version map lock poisoned");
        let mut findings = Vec::new();

        if let Some(active) = Self::find_active_locked(&versions) {
            let guard = versions[&active].lock().expect("key version lock poisoned");
            let activated_at = guard.activated_at.unwrap_or(guard.created_at);
            let age_days = Utc::now().signed_duration_since(activated_at).num_days();
            if age_days >= policy.max_age_days as i64 {
                warn!(version = active, age_days, "active key past maximum age");
                findings.push(SweepFinding {
                    version: active,
                    age_days,
                    overdue: true,
                });
            } else if age_days >= policy.interval_days as i64 {
                warn!(version = active, age_days, "active key due for rotation");
                findings.push(SweepFinding {
                    version: active,
                    age_days,
                    overdue: false,
                });
            }
        }
        findings
    }

    fn version_entry(&self, version: u32) -> Result<Arc<Mutex<KeyVersion>>> {
        let versions = self.versions.read().expect("version map lock poisoned");
        versions
            .get(&version)
            .cloned()
            .ok_or(CipherError::KeyNotFound(version))
    }

    fn find_active_locked(versions: &BTreeMap<u32, Arc<Mutex<KeyVersion>>>) -> Option<u32> {
        versions.iter().find_map(|(&version, entry)| {
            (entry.lock().expect("key version lock poisoned").state == KeyState::Active)
                .then_some(version)
        })
    }

    fn insert_version_locked(
        &self,
        versions: &mut BTreeMap<u32, Arc<Mutex<KeyVersion>>>,
        material: SecretBytes32,
    ) -> Result<u32> {
        let version = versions.keys().next_back().copied().unwrap_or(0) + 1;
        let fingerprint = hash::key_fingerprint(material.as_bytes());

        self.store.store(version, &material)?;
        let stored = self.store.fetch(version)?;
        if hash::sha3_512(stored.as_bytes()) != hash::sha3_512(material.as_bytes()) {
            return Err(CipherError::KeyStateInvalid(format!(
                "stored material for version {version} failed integrity verification"
            )));
        }

        versions.insert(version, Arc::new(Mutex::new(KeyVersion::new(version, fingerprint))));
        info!(version, "key version created");
        Ok(version)
    }

    fn archive_overflow_locked(
        &self,
        versions: &BTreeMap<u32, Arc<Mutex<KeyVersion>>>,
        policy: &RotationPolicy,
    ) -> Result<()> {
        loop {
            let mut retained = 0usize;
            let mut oldest_rotated: Option<u32> = None;
            for (&version, entry) in versions.iter() {
                let guard = entry.lock().expect("key version lock poisoned");
                match guard.state {
                    KeyState::Active => retained += 1,
                    KeyState::Rotated => {
                        retained += 1;
                        if oldest_rotated.is_none() {
                            oldest_rotated = Some(version);
                        }
                    }
                    _ => {}
                }
            }
            if retained <= policy.retention_cycles as usize {
                return Ok(());
            }
            let Some(version) = oldest_rotated else {
                return Ok(());
            };

            // Erase in place before the state flag changes.
            self.store.erase(
                version,
                policy.destruction_method,
                policy.destruction_passes,
            )?;
            let mut guard = versions[&version].lock().expect("key version lock poisoned");
            guard.schedule_cache = None;
            guard.state = KeyState::Archived;
            guard.archived_at = Some(Utc::now());
            info!(version, "key version archived after retention overflow");
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate_activation(&self, version: u32, days: i64) {
        let entry = self.version_entry(version).unwrap();
        let mut guard = entry.lock().unwrap();
        let activated = guard.activated_at.unwrap_or(guard.created_at);
        guard.activated_at = Some(activated - chrono::Duration::days(days));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropySource;

    fn manager_with_store() -> (KeyManager, Arc<SoftwareKeyStore>) {
        let store = Arc::new(SoftwareKeyStore::new());
        let manager = KeyManager::new(store.clone(), RotationPolicy::default()).unwrap();
        (manager, store)
    }

    fn fresh_material() -> SecretBytes32 {
        let mut entropy = EntropySource::new();
        let mut bytes = [0u8; 32];
        entropy.fill(&mut bytes).unwrap();
        SecretBytes32::from(bytes)
    }

    fn rotated_manager(n: usize) -> (KeyManager, Arc<SoftwareKeyStore>) {
        let (manager, store) = manager_with_store();
        let first = manager.import(fresh_material()).unwrap();
        manager.activate(first).unwrap();
        for _ in 0..n {
            let active = manager.active_version().unwrap();
            manager.backdate_activation(active, 2);
            manager.rotate(fresh_material()).unwrap();
        }
        (manager, store)
    }

    #[test]
    fn test_import_and_activate() {
        let (manager, _) = manager_with_store();
        let version = manager.import(fresh_material()).unwrap();
        assert_eq!(version, 1);
        assert_eq!(manager.metadata(1).unwrap().state, KeyState::Generated);

        manager.activate(1).unwrap();
        let meta = manager.metadata(1).unwrap();
        assert_eq!(meta.state, KeyState::Active);
        assert!(meta.activated_at.is_some());
        assert_eq!(manager.active_version().unwrap(), 1);
    }

    #[test]
    fn test_second_activate_rejected() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();

        manager.import(fresh_material()).unwrap();
        assert!(matches!(
            manager.activate(2),
            Err(CipherError::KeyStateInvalid(_))
        ));
    }

    #[test]
    fn test_activate_unknown_version() {
        let (manager, _) = manager_with_store();
        assert!(matches!(
            manager.activate(9),
            Err(CipherError::KeyNotFound(9))
        ));
    }

    #[test]
    fn test_rotation_demotes_and_promotes() {
        let (manager, _) = rotated_manager(1);
        assert_eq!(manager.metadata(1).unwrap().state, KeyState::Rotated);
        assert_eq!(manager.metadata(2).unwrap().state, KeyState::Active);
        assert_eq!(manager.active_version().unwrap(), 2);
    }

    #[test]
    fn test_rotation_respects_min_age() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();

        // Activated moments ago; default policy wants at least one day.
        assert!(matches!(
            manager.rotate(fresh_material()),
            Err(CipherError::RotationTooSoon { .. })
        ));
    }

    #[test]
    fn test_retention_overflow_archives_and_erases() {
        // Default retention keeps 3 versions; after 3 rotations version 1
        // must be archived with its material zeroed.
        let (manager, store) = rotated_manager(3);
        assert_eq!(manager.metadata(1).unwrap().state, KeyState::Archived);
        assert_eq!(manager.metadata(2).unwrap().state, KeyState::Rotated);

        assert_eq!(store.raw_material(1), Some([0u8; 32]));
        assert!(matches!(
            manager.schedule_for(1, &[0u8; 16]),
            Err(CipherError::KeyStateInvalid(_))
        ));
    }

    #[test]
    fn test_destroy_erases_material() {
        let (manager, store) = rotated_manager(1);
        manager.destroy(1).unwrap();

        let meta = manager.metadata(1).unwrap();
        assert_eq!(meta.state, KeyState::Destroyed);
        assert!(meta.destroyed_at.is_some());
        assert_eq!(store.raw_material(1), Some([0u8; 32]));
        assert!(matches!(
            manager.master_material(1),
            Err(CipherError::KeyStateInvalid(_))
        ));
    }

    #[test]
    fn test_destroy_active_rejected() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();
        assert!(matches!(
            manager.destroy(1),
            Err(CipherError::KeyStateInvalid(_))
        ));
    }

    #[test]
    fn test_destroy_twice_rejected() {
        let (manager, _) = rotated_manager(1);
        manager.destroy(1).unwrap();
        assert!(matches!(
            manager.destroy(1),
            Err(CipherError::KeyStateInvalid(_))
        ));
    }

    #[test]
    fn test_decrypt_candidates_order() {
        let (manager, _) = rotated_manager(2);
        // Active version first, then rotated versions oldest first.
        assert_eq!(manager.decrypt_candidates(), vec![3, 1, 2]);
    }

    #[test]
    fn test_schedule_cache_reuse() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();

        let nonce = [0x11u8; 16];
        let first = manager.schedule_for(1, &nonce).unwrap();
        let second = manager.schedule_for(1, &nonce).unwrap();
        assert_eq!(first.round_keys.key(0), second.round_keys.key(0));
        assert_eq!(first.iv, second.iv);

        let other = manager.schedule_for(1, &[0x22u8; 16]).unwrap();
        assert_ne!(first.iv, other.iv);
    }

    #[test]
    fn test_counters_advance() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();

        manager.record_encrypt(1).unwrap();
        manager.record_encrypt(1).unwrap();
        manager.record_decrypt(1).unwrap();

        let meta = manager.metadata(1).unwrap();
        assert_eq!(meta.enc_counter, 2);
        assert_eq!(meta.dec_counter, 1);
    }

    #[test]
    fn test_list_is_version_ordered() {
        let (manager, _) = rotated_manager(2);
        let versions: Vec<u32> = manager.list().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_sweep_reports_aging_key() {
        let (manager, _) = manager_with_store();
        manager.import(fresh_material()).unwrap();
        manager.activate(1).unwrap();
        assert!(manager.sweep().is_empty());

        manager.backdate_activation(1, 366);
        let findings = manager.sweep();
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].overdue);

        manager.backdate_activation(1, 40);
        let findings = manager.sweep();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].overdue);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let store = Arc::new(SoftwareKeyStore::new());
        let bad = RotationPolicy {
            retention_cycles: 0,
            ..Default::default()
        };
        assert!(KeyManager::new(store, bad).is_err());

        let (manager, _) = manager_with_store();
        assert!(manager
            .set_policy(RotationPolicy {
                min_age_days: 0,
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn test_key_hash_matches_material() {
        let (manager, store) = manager_with_store();
        manager.import(fresh_material()).unwrap();

        let material = store.raw_material(1).unwrap();
        let expected = hex::encode(hash::key_fingerprint(&material));
        assert_eq!(manager.metadata(1).unwrap().key_hash, expected);
    }
}
