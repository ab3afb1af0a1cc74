//! In-memory fakes shared by the pipeline tests

use super::session::{MailSession, SessionFactory};
use async_trait::async_trait;
use mailstead_common::types::{AccountId, DomainId, EmailAddress, FolderId, FolderKind, MessageRowId};
use mailstead_common::{Error, Result};
use mailstead_storage::models::{
    CreateDomain, CreateStoredMessage, Domain, Folder, StoredMessage,
};
use mailstead_storage::repository::{DomainRepository, FolderRepository, MessageRepository};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Folder, message, and domain storage backed by vectors
pub struct MemStore {
    pub domains: Mutex<Vec<Domain>>,
    pub folders: Mutex<Vec<Folder>>,
    pub messages: Mutex<Vec<StoredMessage>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            domains: Mutex::new(Vec::new()),
            folders: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn add_domain(&self, spam_threshold: f64, antispam: bool) -> Domain {
        let now = chrono::Utc::now();
        let domain = Domain {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            name: "example.com".to_string(),
            enabled: true,
            kind: "primary".to_string(),
            quota_bytes: 0,
            default_mailbox_quota: 0,
            antivirus: true,
            antispam,
            spam_threshold,
            created_at: now,
            updated_at: now,
        };
        self.domains.lock().unwrap().push(domain.clone());
        domain
    }

    pub fn folder_named(&self, name: &str) -> Option<Folder> {
        self.folders
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.name == name)
            .cloned()
    }

    pub fn messages_in(&self, folder_id: FolderId) -> Vec<StoredMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.folder_id == folder_id && !m.is_deleted)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DomainRepository for MemStore {
    async fn create(&self, _input: CreateDomain) -> Result<Domain> {
        unimplemented!()
    }

    async fn get(&self, id: DomainId) -> Result<Option<Domain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Domain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<Domain>> {
        Ok(Vec::new())
    }

    async fn set_enabled(&self, _id: DomainId, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl FolderRepository for MemStore {
    async fn get_or_create(
        &self,
        account_id: AccountId,
        name: &str,
        kind: FolderKind,
    ) -> Result<Folder> {
        let mut folders = self.folders.lock().unwrap();
        if let Some(existing) = folders
            .iter()
            .find(|f| f.account_id == account_id && f.name == name)
        {
            return Ok(existing.clone());
        }
        let now = chrono::Utc::now();
        let folder = Folder {
            id: Uuid::now_v7(),
            account_id,
            name: name.to_string(),
            kind: kind.to_string(),
            unread_count: 0,
            total_count: 0,
            created_at: now,
            updated_at: now,
        };
        folders.push(folder.clone());
        Ok(folder)
    }

    async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == id)
            .cloned())
    }

    async fn get_by_name(&self, account_id: AccountId, name: &str) -> Result<Option<Folder>> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.account_id == account_id && f.name == name)
            .cloned())
    }

    async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Folder>> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn recompute_counts(&self, id: FolderId) -> Result<()> {
        let messages = self.messages.lock().unwrap();
        let total = messages
            .iter()
            .filter(|m| m.folder_id == id && !m.is_deleted)
            .count() as i32;
        let unread = messages
            .iter()
            .filter(|m| m.folder_id == id && !m.is_deleted && !m.is_read)
            .count() as i32;
        drop(messages);

        let mut folders = self.folders.lock().unwrap();
        if let Some(folder) = folders.iter_mut().find(|f| f.id == id) {
            folder.total_count = total;
            folder.unread_count = unread;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemStore {
    async fn create(&self, input: CreateStoredMessage) -> Result<StoredMessage> {
        let now = chrono::Utc::now();
        let message = StoredMessage {
            id: Uuid::now_v7(),
            folder_id: input.folder_id,
            message_id: input.message_id,
            subject: input.subject,
            sender: input.sender,
            sender_name: input.sender_name,
            to_recipients: serde_json::to_value(&input.to_recipients).unwrap(),
            cc_recipients: serde_json::to_value(&input.cc_recipients).unwrap(),
            bcc_recipients: serde_json::to_value(&input.bcc_recipients).unwrap(),
            body_text: input.body_text,
            body_html: input.body_html,
            snippet: input.snippet,
            sent_at: input.sent_at,
            received_at: input.received_at,
            size_bytes: input.size_bytes,
            is_read: input.is_read,
            is_starred: false,
            is_deleted: false,
            spam_score: input.spam_score,
            is_spam: input.is_spam,
            created_at: now,
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn get(&self, id: MessageRowId) -> Result<Option<StoredMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn exists_by_message_id(&self, account_id: AccountId, message_id: &str) -> Result<bool> {
        let folder_ids: Vec<FolderId> = self
            .folders
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.account_id == account_id)
            .map(|f| f.id)
            .collect();
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.message_id == message_id && folder_ids.contains(&m.folder_id)))
    }

    async fn list_by_folder(&self, folder_id: FolderId) -> Result<Vec<StoredMessage>> {
        Ok(self.messages_in(folder_id))
    }

    async fn set_read(&self, id: MessageRowId, is_read: bool) -> Result<()> {
        let mut folder_id = None;
        if let Some(m) = self.messages.lock().unwrap().iter_mut().find(|m| m.id == id) {
            m.is_read = is_read;
            folder_id = Some(m.folder_id);
        }
        if let Some(folder_id) = folder_id {
            self.recompute_counts(folder_id).await?;
        }
        Ok(())
    }

    async fn set_starred(&self, id: MessageRowId, is_starred: bool) -> Result<()> {
        if let Some(m) = self.messages.lock().unwrap().iter_mut().find(|m| m.id == id) {
            m.is_starred = is_starred;
        }
        Ok(())
    }

    async fn move_to_folder(&self, id: MessageRowId, folder_id: FolderId) -> Result<()> {
        let mut previous = None;
        if let Some(m) = self.messages.lock().unwrap().iter_mut().find(|m| m.id == id) {
            previous = Some(m.folder_id);
            m.folder_id = folder_id;
        }
        if let Some(previous) = previous {
            self.recompute_counts(previous).await?;
        }
        self.recompute_counts(folder_id).await?;
        Ok(())
    }

    async fn mark_deleted(&self, id: MessageRowId) -> Result<()> {
        let mut folder_id = None;
        if let Some(m) = self.messages.lock().unwrap().iter_mut().find(|m| m.id == id) {
            m.is_deleted = true;
            folder_id = Some(m.folder_id);
        }
        if let Some(folder_id) = folder_id {
            self.recompute_counts(folder_id).await?;
        }
        Ok(())
    }
}

/// Scriptable remote mailbox shared by every session the factory opens
pub struct RemoteMailbox {
    pub folders: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    pub appended: Mutex<Vec<(String, Vec<u8>)>>,
    pub expunged: Mutex<Vec<(String, u32)>>,
    pub fail_append: AtomicBool,
    pub fail_open: AtomicBool,
}

impl RemoteMailbox {
    pub fn new() -> Arc<Self> {
        let mut folders = HashMap::new();
        folders.insert("INBOX".to_string(), Vec::new());
        Arc::new(Self {
            folders: Mutex::new(folders),
            appended: Mutex::new(Vec::new()),
            expunged: Mutex::new(Vec::new()),
            fail_append: AtomicBool::new(false),
            fail_open: AtomicBool::new(false),
        })
    }

    pub fn put(&self, folder: &str, raw: impl Into<Vec<u8>>) {
        self.folders
            .lock()
            .unwrap()
            .entry(folder.to_string())
            .or_default()
            .push(raw.into());
    }
}

pub struct FakeSession {
    remote: Arc<RemoteMailbox>,
    selected: Option<String>,
}

#[async_trait]
impl MailSession for FakeSession {
    async fn list_folders(&mut self) -> Result<Vec<String>> {
        Ok(self.remote.folders.lock().unwrap().keys().cloned().collect())
    }

    async fn create_folder(&mut self, name: &str) -> Result<()> {
        self.remote
            .folders
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn select(&mut self, folder: &str) -> Result<u32> {
        let folders = self.remote.folders.lock().unwrap();
        let messages = folders
            .get(folder)
            .ok_or_else(|| Error::Imap(format!("No such folder {folder}")))?;
        let count = messages.len() as u32;
        drop(folders);
        self.selected = Some(folder.to_string());
        Ok(count)
    }

    async fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>> {
        let selected = self
            .selected
            .clone()
            .ok_or_else(|| Error::Imap("No folder selected".to_string()))?;
        self.remote
            .folders
            .lock()
            .unwrap()
            .get(&selected)
            .and_then(|msgs| msgs.get((seq as usize).checked_sub(1)?))
            .cloned()
            .ok_or_else(|| Error::Imap(format!("No message {seq}")))
    }

    async fn append(&mut self, folder: &str, raw: &[u8]) -> Result<()> {
        if self.remote.fail_append.load(Ordering::SeqCst) {
            return Err(Error::Imap("append rejected".to_string()));
        }
        self.remote
            .appended
            .lock()
            .unwrap()
            .push((folder.to_string(), raw.to_vec()));
        self.remote
            .folders
            .lock()
            .unwrap()
            .entry(folder.to_string())
            .or_default()
            .push(raw.to_vec());
        Ok(())
    }

    async fn copy_message(&mut self, seq: u32, folder: &str) -> Result<()> {
        let raw = self.fetch_raw(seq).await?;
        self.remote
            .folders
            .lock()
            .unwrap()
            .entry(folder.to_string())
            .or_default()
            .push(raw);
        Ok(())
    }

    async fn mark_deleted(&mut self, seq: u32) -> Result<()> {
        let selected = self
            .selected
            .clone()
            .ok_or_else(|| Error::Imap("No folder selected".to_string()))?;
        self.remote.expunged.lock().unwrap().push((selected, seq));
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let mut folders = self.remote.folders.lock().unwrap();
        for (folder, seq) in self.remote.expunged.lock().unwrap().drain(..) {
            if let Some(messages) = folders.get_mut(&folder) {
                let idx = (seq as usize).saturating_sub(1);
                if idx < messages.len() {
                    messages.remove(idx);
                }
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct FakeSessionFactory {
    pub remote: Arc<RemoteMailbox>,
}

impl FakeSessionFactory {
    pub fn new(remote: Arc<RemoteMailbox>) -> Arc<Self> {
        Arc::new(Self { remote })
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, _address: &EmailAddress, _password: &str) -> Result<Box<dyn MailSession>> {
        if self.remote.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Connectivity("connection refused".to_string()));
        }
        Ok(Box::new(FakeSession {
            remote: self.remote.clone(),
            selected: None,
        }))
    }
}
