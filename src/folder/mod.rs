//! # Folder module
//!
//! Module dedicated to folder management. The main entities are
//! [`Folder`], the canonical record held by the pool's entity store,
//! and [`FolderKind`], the module-tagged variant carrying
//! module-specific extension fields.
//!
//! The [`config`] module exposes the pool configuration, including
//! the aggregation [`config::ExclusionPolicy`].

pub mod config;
mod error;

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::error::{Error, Result};
use crate::pool::listing::ListingKey;

/// Alias for the folder unique identifier.
pub type FolderId = String;

/// The folder module enumeration.
///
/// Every folder belongs to exactly one module. Contacts, calendar
/// and tasks folders are organized into flat sections rather than an
/// arbitrary tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderModule {
    Mail,
    Calendar,
    Contacts,
    Tasks,
    Files,
    System,
    Virtual,
    Unknown,
}

impl FolderModule {
    /// Return `true` if folders of this module are organized into
    /// flat sections (private/public/shared) instead of a tree.
    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Calendar | Self::Contacts | Self::Tasks)
    }

    /// Return the folder module as string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mail => "mail",
            Self::Calendar => "calendar",
            Self::Contacts => "contacts",
            Self::Tasks => "tasks",
            Self::Files => "files",
            Self::System => "system",
            Self::Virtual => "virtual",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for FolderModule {
    type Err = Error;

    fn from_str(module: &str) -> Result<Self> {
        match module {
            module if module.eq_ignore_ascii_case("mail") => Ok(Self::Mail),
            module if module.eq_ignore_ascii_case("calendar") => Ok(Self::Calendar),
            module if module.eq_ignore_ascii_case("contacts") => Ok(Self::Contacts),
            module if module.eq_ignore_ascii_case("tasks") => Ok(Self::Tasks),
            module if module.eq_ignore_ascii_case("files") => Ok(Self::Files),
            module if module.eq_ignore_ascii_case("system") => Ok(Self::System),
            module if module.eq_ignore_ascii_case("virtual") => Ok(Self::Virtual),
            module => Err(Error::ParseFolderModuleError(module.to_owned())),
        }
    }
}

impl fmt::Display for FolderModule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The folder role enumeration.
///
/// The role gives a specific purpose to a folder. It drives the
/// aggregation exclusion policy: trash, spam and aggregate roles do
/// not participate in subtotal sums.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FolderRole {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Spam,
    ConfirmedSpam,
    Archive,

    /// The synthetic entity aggregating unread messages across
    /// accounts. Excluded from subtotal sums to avoid double
    /// counting.
    UnreadAggregate,

    /// The unified cross-account aggregate folder. Skipped as a
    /// bubbling target since its messages are duplicated from other
    /// accounts.
    Unified,

    /// The user-defined role, as delivered by the remote service.
    UserDefined(String),
}

impl FolderRole {
    pub fn is_trash(&self) -> bool {
        matches!(self, Self::Trash)
    }

    pub fn is_spam(&self) -> bool {
        matches!(self, Self::Spam | Self::ConfirmedSpam)
    }

    pub fn is_unified(&self) -> bool {
        matches!(self, Self::Unified)
    }

    /// Return the folder role as string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Drafts => "drafts",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::ConfirmedSpam => "confirmed-spam",
            Self::Archive => "archive",
            Self::UnreadAggregate => "unread",
            Self::Unified => "unified",
            Self::UserDefined(role) => role.as_str(),
        }
    }
}

impl FromStr for FolderRole {
    type Err = Error;

    fn from_str(role: &str) -> Result<Self> {
        match role {
            role if role.eq_ignore_ascii_case("inbox") => Ok(Self::Inbox),
            role if role.eq_ignore_ascii_case("sent") => Ok(Self::Sent),
            role if role.eq_ignore_ascii_case("drafts") => Ok(Self::Drafts),
            role if role.eq_ignore_ascii_case("trash") => Ok(Self::Trash),
            role if role.eq_ignore_ascii_case("spam") => Ok(Self::Spam),
            role if role.eq_ignore_ascii_case("confirmed-spam") => Ok(Self::ConfirmedSpam),
            role if role.eq_ignore_ascii_case("archive") => Ok(Self::Archive),
            role if role.eq_ignore_ascii_case("unread") => Ok(Self::UnreadAggregate),
            role if role.eq_ignore_ascii_case("unified") => Ok(Self::Unified),
            role => Err(Error::ParseFolderRoleError(role.to_owned())),
        }
    }
}

impl<T: AsRef<str>> From<T> for FolderRole {
    fn from(role: T) -> Self {
        role.as_ref()
            .parse()
            .ok()
            .unwrap_or_else(|| Self::UserDefined(role.as_ref().to_owned()))
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The folder rights bitmask.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Rights(pub u64);

impl Rights {
    pub const READ: u64 = 1;
    pub const CREATE: u64 = 1 << 1;
    pub const WRITE: u64 = 1 << 2;
    pub const DELETE: u64 = 1 << 3;
    pub const ADMIN: u64 = 1 << 28;

    pub fn can(&self, right: u64) -> bool {
        self.0 & right != 0
    }

    pub fn is_admin(&self) -> bool {
        self.can(Self::ADMIN)
    }
}

/// A single entry of a folder permission list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// The user or group the permission applies to.
    pub entity: String,

    /// Whether the entity refers to a group.
    pub group: bool,

    /// The permission bitmask, same layout as [`Rights`].
    pub bits: u64,
}

impl Permission {
    pub fn is_admin(&self) -> bool {
        Rights(self.bits).is_admin()
    }
}

/// The module-tagged folder variant.
///
/// Carries module-specific extension fields on top of the common
/// [`Folder`] record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FolderKind {
    Mail(MailFolder),
    Calendar(CalendarFolder),
    Contacts,
    Tasks,
    Files,
    System,
    Virtual,
    Unknown,
}

impl FolderKind {
    /// Return the module this kind belongs to.
    pub fn module(&self) -> FolderModule {
        match self {
            Self::Mail(_) => FolderModule::Mail,
            Self::Calendar(_) => FolderModule::Calendar,
            Self::Contacts => FolderModule::Contacts,
            Self::Tasks => FolderModule::Tasks,
            Self::Files => FolderModule::Files,
            Self::System => FolderModule::System,
            Self::Virtual => FolderModule::Virtual,
            Self::Unknown => FolderModule::Unknown,
        }
    }

    pub(crate) fn from_module(module: FolderModule) -> Self {
        match module {
            FolderModule::Mail => Self::Mail(MailFolder::default()),
            FolderModule::Calendar => Self::Calendar(CalendarFolder::default()),
            FolderModule::Contacts => Self::Contacts,
            FolderModule::Tasks => Self::Tasks,
            FolderModule::Files => Self::Files,
            FolderModule::System => Self::System,
            FolderModule::Virtual => Self::Virtual,
            FolderModule::Unknown => Self::Unknown,
        }
    }
}

impl Default for FolderKind {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The mail-specific folder extension.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MailFolder {
    /// Whether the folder belongs to the unified cross-account
    /// mailbox.
    pub unified: bool,
}

/// The calendar-specific folder extension.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CalendarFolder {
    /// The resource this calendar represents, if any.
    pub resource_id: Option<String>,

    /// The user-assigned calendar color.
    pub color: Option<String>,
}

/// The folder structure.
///
/// One canonical record per folder id, held by the pool's entity
/// store. Created lazily as a stub on first reference, completed on
/// first successful fetch, patched optimistically by mutations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Folder {
    /// The folder unique identifier.
    pub id: FolderId,

    /// The parent folder identifier, `None` for roots.
    pub parent_id: Option<FolderId>,

    /// The folder title.
    pub title: String,

    /// The optional title override used for display.
    pub display_title: Option<String>,

    /// The rights of the current user on the folder.
    pub own_rights: Rights,

    /// The set of capabilities supported by the folder.
    pub supported_capabilities: HashSet<String>,

    /// The folder permission list.
    pub permissions: Vec<Permission>,

    /// Whether the current user subscribed to the folder.
    pub subscribed: bool,

    /// Whether the folder is known to have subfolders.
    pub has_subfolders: bool,

    /// The total amount of items, `-1` when unknown. The sentinel
    /// never participates in arithmetic.
    pub total: i64,

    /// The amount of unread items.
    pub unread: u64,

    /// The aggregated count rolled up from the children. Owned by
    /// the count aggregator, never set directly.
    pub subtotal: u64,

    /// Ids of virtual folders whose listing contains this folder.
    pub virtual_parents: HashSet<FolderId>,

    /// Whether the folder is a standard (default) folder.
    pub standard_folder: bool,

    /// The optional folder role.
    pub role: Option<FolderRole>,

    /// The module-tagged variant with extension fields.
    pub kind: FolderKind,

    /// Per-listing numeric sort keys, keyed by the listing scope.
    pub(crate) sort_keys: HashMap<ListingKey, u64>,

    /// Whether the record is a lazy stub with only the id set.
    pub(crate) stub: bool,
}

impl Folder {
    /// Create a minimal stub with only the id set.
    pub fn stub(id: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            total: -1,
            stub: true,
            ..Default::default()
        }
    }

    /// Return the module the folder belongs to.
    pub fn module(&self) -> FolderModule {
        self.kind.module()
    }

    /// Return `true` if the record is still a lazy stub.
    pub fn is_stub(&self) -> bool {
        self.stub
    }

    pub fn is_trash(&self) -> bool {
        self.role.as_ref().map(FolderRole::is_trash).unwrap_or_default()
    }

    pub fn is_spam(&self) -> bool {
        self.role.as_ref().map(FolderRole::is_spam).unwrap_or_default()
    }

    /// Return `true` if the folder aggregates duplicated
    /// cross-account items.
    pub fn is_unified(&self) -> bool {
        match &self.kind {
            FolderKind::Mail(mail) if mail.unified => true,
            _ => self.role.as_ref().map(FolderRole::is_unified).unwrap_or_default(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, FolderKind::Virtual)
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, FolderKind::System)
    }

    /// Return `true` if the current user holds the given right.
    pub fn can(&self, right: u64) -> bool {
        self.own_rights.can(right)
    }

    /// Return `true` if the folder supports the given capability.
    pub fn supports(&self, capability: impl AsRef<str>) -> bool {
        self.supported_capabilities.contains(capability.as_ref())
    }

    /// Return `true` if the folder is shared by the current user
    /// with at least one other entity.
    pub fn is_shared_by_me(&self) -> bool {
        self.own_rights.is_admin() && self.permissions.len() > 1
    }

    /// Return the display title override if set, otherwise the
    /// title.
    pub fn get_display_title(&self) -> &str {
        self.display_title.as_deref().unwrap_or(self.title.as_str())
    }

    /// Return the sort key of the folder within the given listing
    /// scope.
    pub fn sort_key(&self, key: &ListingKey) -> Option<u64> {
        self.sort_keys.get(key).copied()
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_display_title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_str_test() {
        assert_eq!("trash".parse::<FolderRole>().unwrap(), FolderRole::Trash);
        assert_eq!(
            "Confirmed-Spam".parse::<FolderRole>().unwrap(),
            FolderRole::ConfirmedSpam,
        );
        assert_eq!(
            FolderRole::from("weekly-report"),
            FolderRole::UserDefined("weekly-report".into()),
        );
    }

    #[test]
    fn module_flat_test() {
        assert!(FolderModule::Contacts.is_flat());
        assert!(FolderModule::Calendar.is_flat());
        assert!(!FolderModule::Mail.is_flat());
        assert!(!FolderModule::Files.is_flat());
    }

    #[test]
    fn stub_test() {
        let folder = Folder::stub("1337");
        assert!(folder.is_stub());
        assert_eq!(folder.total, -1);
        assert_eq!(folder.module(), FolderModule::Unknown);
    }

    #[test]
    fn shared_by_me_test() {
        let mut folder = Folder::stub("1337");
        folder.own_rights = Rights(Rights::ADMIN);
        folder.permissions = vec![
            Permission {
                entity: "me".into(),
                group: false,
                bits: Rights::ADMIN,
            },
            Permission {
                entity: "them".into(),
                group: false,
                bits: Rights::READ,
            },
        ];
        assert!(folder.is_shared_by_me());

        folder.permissions.pop();
        assert!(!folder.is_shared_by_me());
    }

    #[test]
    fn unified_test() {
        let mut folder = Folder::stub("1337");
        folder.kind = FolderKind::Mail(MailFolder { unified: true });
        assert!(folder.is_unified());

        folder.kind = FolderKind::Mail(MailFolder::default());
        assert!(!folder.is_unified());

        folder.role = Some(FolderRole::Unified);
        assert!(folder.is_unified());
    }
}
