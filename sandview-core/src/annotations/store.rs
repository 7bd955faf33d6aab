use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sandview_model::{
    Cause, MachineId, PassDiagnosis, PassId, PassNote, Symptom,
};

use crate::error::Result;
use crate::platform::DataPlatform;

const NOTE_PREFIX: &str = "note-";
const DIAGNOSIS_PREFIX: &str = "diagnosis-";

/// Identity stamped into `created_by`/`updated_by` on every write.
pub const WRITER_IDENTITY: &str = "sandview-dashboard";

#[derive(Default)]
struct Cache {
    /// Whole blob as last seen, including keys owned by other tools.
    metadata: Option<BTreeMap<String, String>>,
    notes: Option<HashMap<PassId, PassNote>>,
    diagnoses: Option<HashMap<PassId, PassDiagnosis>>,
}

/// Read/merge/write access to one machine's annotation namespace.
///
/// The backing store is a flat string-to-string blob shared by every tool
/// that touches the machine; notes live under `note-{pass_id}` keys and
/// diagnoses under `diagnosis-{pass_id}`. Writes always merge into the
/// full blob and only touch keys in those two namespaces, so concurrent
/// writers' keys survive. The blob itself offers no compare-and-swap, so
/// last-writer-wins at whole-blob granularity is an accepted limitation.
///
/// The blob is fetched lazily once per store and cached for the session;
/// use one store per machine (see
/// [`AnnotationRegistry`](crate::annotations::AnnotationRegistry)).
pub struct AnnotationStore {
    platform: Arc<dyn DataPlatform>,
    machine_id: MachineId,
    cache: Mutex<Cache>,
}

impl std::fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationStore")
            .field("machine_id", &self.machine_id)
            .finish()
    }
}

impl AnnotationStore {
    pub fn new(platform: Arc<dyn DataPlatform>, machine_id: MachineId) -> Self {
        Self {
            platform,
            machine_id,
            cache: Mutex::new(Cache::default()),
        }
    }

    pub fn machine_id(&self) -> &MachineId {
        &self.machine_id
    }

    /// All notes, keyed by pass id.
    pub async fn notes(&self) -> Result<HashMap<PassId, PassNote>> {
        let mut cache = self.cache.lock().await;
        self.ensure_notes(&mut cache).await?;
        Ok(cache.notes.clone().unwrap_or_default())
    }

    /// All diagnoses, keyed by pass id.
    pub async fn diagnoses(&self) -> Result<HashMap<PassId, PassDiagnosis>> {
        let mut cache = self.cache.lock().await;
        self.ensure_diagnoses(&mut cache).await?;
        Ok(cache.diagnoses.clone().unwrap_or_default())
    }

    /// Notes for a specific set of passes.
    pub async fn notes_for_passes(
        &self,
        pass_ids: &[PassId],
    ) -> Result<HashMap<PassId, PassNote>> {
        debug!("fetching notes for {} passes", pass_ids.len());
        let all = self.notes().await?;
        let found: HashMap<PassId, PassNote> = pass_ids
            .iter()
            .filter_map(|id| all.get(id).map(|note| (id.clone(), note.clone())))
            .collect();
        debug!("found notes for {} passes", found.len());
        Ok(found)
    }

    /// Diagnoses for a specific set of passes.
    pub async fn diagnoses_for_passes(
        &self,
        pass_ids: &[PassId],
    ) -> Result<HashMap<PassId, PassDiagnosis>> {
        debug!("fetching diagnoses for {} passes", pass_ids.len());
        let all = self.diagnoses().await?;
        let found: HashMap<PassId, PassDiagnosis> = pass_ids
            .iter()
            .filter_map(|id| all.get(id).map(|diag| (id.clone(), diag.clone())))
            .collect();
        debug!("found diagnoses for {} passes", found.len());
        Ok(found)
    }

    /// Fan-out fetch of notes and diagnoses for a batch of passes; both
    /// complete before the pair is returned.
    pub async fn fetch_for_passes(
        &self,
        pass_ids: &[PassId],
    ) -> Result<(
        HashMap<PassId, PassNote>,
        HashMap<PassId, PassDiagnosis>,
    )> {
        let (notes, diagnoses) = futures::join!(
            self.notes_for_passes(pass_ids),
            self.diagnoses_for_passes(pass_ids),
        );
        Ok((notes?, diagnoses?))
    }

    /// Save (replace) the note for a pass. Empty or whitespace-only text
    /// deletes the note instead.
    pub async fn save_note(&self, pass_id: &PassId, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            info!(pass = %pass_id, "note text is empty, deleting note instead");
            return self.delete_note(pass_id).await;
        }

        let mut cache = self.cache.lock().await;
        self.ensure_notes(&mut cache).await?;

        let note = PassNote {
            pass_id: pass_id.clone(),
            note_text: text.to_string(),
            created_at: Utc::now(),
            created_by: WRITER_IDENTITY.to_string(),
        };
        let mut notes = cache.notes.clone().unwrap_or_default();
        notes.insert(pass_id.clone(), note);

        self.write_notes(&mut cache, notes).await?;
        info!(pass = %pass_id, "note saved");
        Ok(())
    }

    /// Delete the note for a pass; logged no-op when there is none.
    pub async fn delete_note(&self, pass_id: &PassId) -> Result<()> {
        let mut cache = self.cache.lock().await;
        self.ensure_notes(&mut cache).await?;

        let mut notes = cache.notes.clone().unwrap_or_default();
        if notes.remove(pass_id).is_none() {
            info!(pass = %pass_id, "no note found for this pass");
            return Ok(());
        }

        self.write_notes(&mut cache, notes).await?;
        info!(pass = %pass_id, "note deleted");
        Ok(())
    }

    /// Upsert the diagnosis for a pass. When both symptom and cause are
    /// absent the diagnosis is deleted instead, regardless of the ticket
    /// URL.
    pub async fn save_diagnosis(
        &self,
        pass_id: &PassId,
        symptom: Option<Symptom>,
        cause: Option<Cause>,
        jira_ticket_url: Option<String>,
    ) -> Result<()> {
        if symptom.is_none() && cause.is_none() {
            info!(
                pass = %pass_id,
                "symptom and cause are both empty, deleting diagnosis"
            );
            return self.delete_diagnosis(pass_id).await;
        }

        let diagnosis = PassDiagnosis {
            pass_id: pass_id.clone(),
            symptom,
            cause,
            jira_ticket_url,
            updated_at: Utc::now(),
            updated_by: WRITER_IDENTITY.to_string(),
        };

        let mut cache = self.cache.lock().await;
        let metadata = self.ensure_metadata(&mut cache).await?;
        let key = format!("{DIAGNOSIS_PREFIX}{pass_id}");
        metadata.insert(key, serde_json::to_string(&diagnosis)?);

        let blob = metadata.clone();
        self.platform
            .put_metadata_blob(&self.machine_id, &blob)
            .await?;

        if let Some(diagnoses) = cache.diagnoses.as_mut() {
            diagnoses.insert(pass_id.clone(), diagnosis);
        }
        info!(pass = %pass_id, "diagnosis saved");
        Ok(())
    }

    /// Delete the diagnosis for a pass; logged no-op when there is none.
    pub async fn delete_diagnosis(&self, pass_id: &PassId) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let metadata = self.ensure_metadata(&mut cache).await?;

        let key = format!("{DIAGNOSIS_PREFIX}{pass_id}");
        if metadata.remove(&key).is_none() {
            info!(pass = %pass_id, "no diagnosis found for this pass");
            return Ok(());
        }

        let blob = metadata.clone();
        self.platform
            .put_metadata_blob(&self.machine_id, &blob)
            .await?;

        if let Some(diagnoses) = cache.diagnoses.as_mut() {
            diagnoses.remove(pass_id);
        }
        info!(pass = %pass_id, "diagnosis deleted");
        Ok(())
    }

    /// Lazily fetch the blob once per session.
    async fn ensure_metadata<'a>(
        &self,
        cache: &'a mut Cache,
    ) -> Result<&'a mut BTreeMap<String, String>> {
        if cache.metadata.is_none() {
            debug!(machine = %self.machine_id, "fetching metadata blob");
            let blob = self
                .platform
                .get_metadata_blob(&self.machine_id)
                .await?;
            cache.metadata = Some(blob);
        }
        Ok(cache
            .metadata
            .as_mut()
            .expect("metadata cache populated above"))
    }

    async fn ensure_notes(&self, cache: &mut Cache) -> Result<()> {
        if cache.notes.is_some() {
            return Ok(());
        }
        let metadata = self.ensure_metadata(cache).await?;
        let notes = parse_by_prefix::<PassNote>(metadata, NOTE_PREFIX, "note");
        debug!("loaded {} notes from metadata", notes.len());
        cache.notes = Some(notes);
        Ok(())
    }

    async fn ensure_diagnoses(&self, cache: &mut Cache) -> Result<()> {
        if cache.diagnoses.is_some() {
            return Ok(());
        }
        let metadata = self.ensure_metadata(cache).await?;
        let diagnoses = parse_by_prefix::<PassDiagnosis>(
            metadata,
            DIAGNOSIS_PREFIX,
            "diagnosis",
        );
        debug!("loaded {} diagnoses from metadata", diagnoses.len());
        cache.diagnoses = Some(diagnoses);
        Ok(())
    }

    /// Rewrite the note namespace from `notes`, leaving every other key in
    /// the blob untouched, and push the merged blob back.
    async fn write_notes(
        &self,
        cache: &mut Cache,
        notes: HashMap<PassId, PassNote>,
    ) -> Result<()> {
        let machine_id = self.machine_id.clone();
        let metadata = self.ensure_metadata(cache).await?;

        metadata.retain(|key, _| !key.starts_with(NOTE_PREFIX));
        for (pass_id, note) in &notes {
            metadata.insert(
                format!("{NOTE_PREFIX}{pass_id}"),
                serde_json::to_string(note)?,
            );
        }

        let blob = metadata.clone();
        self.platform.put_metadata_blob(&machine_id, &blob).await?;
        cache.notes = Some(notes);
        Ok(())
    }
}

/// Collect every `{prefix}{pass_id}` key into typed entries. A key that
/// fails to parse is logged and skipped; it never fails the whole fetch.
fn parse_by_prefix<T: DeserializeOwned>(
    metadata: &BTreeMap<String, String>,
    prefix: &str,
    entity: &str,
) -> HashMap<PassId, T> {
    let mut result = HashMap::new();
    for (key, value) in metadata {
        let Some(pass_id) = key.strip_prefix(prefix) else {
            continue;
        };
        match serde_json::from_str::<T>(value) {
            Ok(parsed) => {
                result.insert(PassId::new(pass_id), parsed);
            }
            Err(err) => {
                warn!(pass = pass_id, "failed to parse {entity}: {err}");
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::InMemoryPlatform;

    fn store() -> (Arc<InMemoryPlatform>, AnnotationStore) {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = AnnotationStore::new(
            platform.clone(),
            MachineId::new("machine-1"),
        );
        (platform, store)
    }

    #[tokio::test]
    async fn save_and_read_back_a_note() {
        let (_, store) = store();
        let pass = PassId::new("p1");

        store.save_note(&pass, "rough patch near the seam").await.unwrap();

        let notes = store.notes().await.unwrap();
        let note = notes.get(&pass).expect("note exists");
        assert_eq!(note.note_text, "rough patch near the seam");
        assert_eq!(note.created_by, WRITER_IDENTITY);
    }

    #[tokio::test]
    async fn empty_note_text_deletes() {
        let (_, store) = store();
        let pass = PassId::new("p1");

        store.save_note(&pass, "something").await.unwrap();
        store.save_note(&pass, "   ").await.unwrap();

        assert!(store.notes().await.unwrap().get(&pass).is_none());
    }

    #[tokio::test]
    async fn foreign_keys_survive_note_writes() {
        let (platform, store) = store();
        let machine = MachineId::new("machine-1");
        let mut blob = BTreeMap::new();
        blob.insert("foo".to_string(), "bar".to_string());
        blob.insert(
            "note-p1".to_string(),
            r#"{"pass_id":"p1","note_text":"old","created_at":"2026-01-01T00:00:00Z","created_by":"other-app"}"#
                .to_string(),
        );
        platform.seed_metadata_blob(&machine, blob);

        store.save_note(&PassId::new("p1"), "new").await.unwrap();

        let blob = platform.metadata_blob(&machine);
        assert_eq!(blob.get("foo").map(String::as_str), Some("bar"));
        let stored: PassNote =
            serde_json::from_str(blob.get("note-p1").unwrap()).unwrap();
        assert_eq!(stored.note_text, "new");
    }

    #[tokio::test]
    async fn unparseable_keys_are_skipped_not_fatal() {
        let (platform, store) = store();
        let machine = MachineId::new("machine-1");
        let mut blob = BTreeMap::new();
        blob.insert("note-bad".to_string(), "{not json".to_string());
        blob.insert(
            "note-good".to_string(),
            r#"{"pass_id":"good","note_text":"ok","created_at":"2026-01-01T00:00:00Z","created_by":"x"}"#
                .to_string(),
        );
        platform.seed_metadata_blob(&machine, blob);

        let notes = store.notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes.contains_key(&PassId::new("good")));
    }

    #[tokio::test]
    async fn empty_diagnosis_deletes_and_deleting_missing_is_a_noop() {
        let (platform, store) = store();
        let pass = PassId::new("p1");

        store
            .save_diagnosis(
                &pass,
                Some(Symptom::PStop),
                Some(Cause::NetworkIssue),
                None,
            )
            .await
            .unwrap();
        assert!(store.diagnoses().await.unwrap().contains_key(&pass));
        let writes_after_save = platform.blob_writes();

        // Both fields absent -> delete.
        store.save_diagnosis(&pass, None, None, None).await.unwrap();
        assert!(!store.diagnoses().await.unwrap().contains_key(&pass));

        // Deleting again writes nothing.
        store.delete_diagnosis(&pass).await.unwrap();
        assert_eq!(platform.blob_writes(), writes_after_save + 1);
    }

    #[tokio::test]
    async fn open_set_labels_round_trip_through_the_blob() {
        let (_, store) = store();
        let pass = PassId::new("p1");

        store
            .save_diagnosis(
                &pass,
                Some(Symptom::Other("Vacuum Failure".to_string())),
                Some(Cause::Unknown),
                Some("https://issues.example.com/SAND-42".to_string()),
            )
            .await
            .unwrap();

        let diagnoses = store.diagnoses().await.unwrap();
        let diagnosis = diagnoses.get(&pass).unwrap();
        assert_eq!(
            diagnosis.symptom,
            Some(Symptom::Other("Vacuum Failure".to_string()))
        );
        assert_eq!(
            diagnosis.jira_ticket_url.as_deref(),
            Some("https://issues.example.com/SAND-42")
        );
    }
}
