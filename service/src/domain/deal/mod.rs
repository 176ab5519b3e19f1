//! [`Deal`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

use crate::domain::{item, user, User};
#[cfg(doc)]
use crate::domain::Item;

/// Negotiation between a buyer and a seller over a single [`Item`].
#[derive(Clone, Debug)]
pub struct Deal {
    /// ID of this [`Deal`].
    pub id: Id,

    /// Human-readable [`Code`] of this [`Deal`].
    pub code: Code,

    /// [`Party`] buying the [`Item`].
    pub buyer: Party,

    /// [`Party`] selling the [`Item`].
    pub seller: Party,

    /// [`Item`] this [`Deal`] is about.
    pub item: item::Ref,

    /// [`item::Snapshot`] of the [`Item`] taken when this [`Deal`] was
    /// created.
    pub snapshot: item::Snapshot,

    /// [`Message`] left by the buyer.
    pub message: Message,

    /// [`Tag`] of this [`Deal`].
    pub tag: Tag,

    /// [`CancellationReason`] of this [`Deal`], if it was cancelled.
    pub cancellation_reason: Option<CancellationReason>,

    /// Current [`Status`] of this [`Deal`].
    pub status: Status,

    /// [`Revision`] of this [`Deal`].
    pub revision: Revision,

    /// [`DateTime`] when this [`Deal`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Deal`] was last updated.
    pub updated_at: UpdateDateTime,

    /// [`DateTime`] when this [`Deal`] was completed.
    pub completed_at: Option<CompletionDateTime>,

    /// [`DateTime`] when this [`Deal`] was cancelled.
    pub cancelled_at: Option<CancellationDateTime>,
}

impl Deal {
    /// Opens a new [`Deal`] in the [`Status::Pending`] state.
    #[must_use]
    pub fn open(
        buyer: Party,
        seller: Party,
        item: item::Ref,
        snapshot: item::Snapshot,
        message: Message,
        tag: Tag,
    ) -> Self {
        let id = Id::new();
        let now = DateTime::now();
        Self {
            id,
            code: Code::from_id(id),
            buyer,
            seller,
            item,
            snapshot,
            message,
            tag,
            cancellation_reason: None,
            status: Status::Pending,
            revision: Revision::INITIAL,
            created_at: now.coerce(),
            updated_at: now.coerce(),
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Returns the uniqueness [`Key`] of this [`Deal`].
    #[must_use]
    pub fn key(&self) -> Key {
        Key {
            buyer_id: self.buyer.id,
            seller_id: self.seller.id,
            item: self.item,
        }
    }

    /// Indicates whether this [`Deal`] is still being negotiated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Moves this [`Deal`] into the provided [`Status`].
    ///
    /// Bumps the [`Revision`] and stamps the matching timestamps. The
    /// `reason` is only kept for [`Status::Cancelled`], where it is required.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::NotAllowed`] if the current [`Status`] cannot move
    ///   into the provided one.
    /// - [`TransitionError::CancellationReasonRequired`] if cancelling without
    ///   a `reason`.
    pub fn transition(
        &mut self,
        to: Status,
        reason: Option<CancellationReason>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::NotAllowed {
                from: self.status,
                to,
            });
        }

        let now = DateTime::now();
        match to {
            Status::Cancelled => {
                let reason =
                    reason.ok_or(TransitionError::CancellationReasonRequired)?;
                self.cancellation_reason = Some(reason);
                self.cancelled_at = Some(now.coerce());
            }
            Status::Completed => {
                self.completed_at = Some(now.coerce());
            }
            Status::Pending
            | Status::Accepted
            | Status::Rejected
            | Status::Incomplete => {}
        }
        self.status = to;
        self.revision = self.revision.next();
        self.updated_at = now.coerce();

        Ok(())
    }
}

/// Error of a [`Deal::transition()`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum TransitionError {
    /// [`Status`] cannot move into the requested one.
    #[display("`{from}` cannot transition to `{to}`")]
    NotAllowed {
        /// Current [`Status`].
        from: Status,

        /// Requested [`Status`].
        to: Status,
    },

    /// [`Status::Cancelled`] requires a [`CancellationReason`].
    #[display("cancelling requires a reason")]
    CancellationReasonRequired,
}

/// ID of a [`Deal`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Short human-readable code of a [`Deal`], like `DL-4Q0ZK7M2`.
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Code(String);

impl Code {
    /// Prefix of every [`Code`].
    pub const PREFIX: &'static str = "DL-";

    /// [Crockford's Base32] alphabet of [`Code`] symbols.
    ///
    /// [Crockford's Base32]: https://www.crockford.com/base32.html
    const ALPHABET: &'static [u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

    /// Number of symbols following the [`Code::PREFIX`].
    const LEN: usize = 8;

    /// Derives the [`Code`] of the [`Deal`] with the provided [`Id`].
    #[must_use]
    pub fn from_id(id: Id) -> Self {
        let hash = xxh3::xxh3_64(id.0.as_bytes());

        let mut code = String::with_capacity(Self::PREFIX.len() + Self::LEN);
        code.push_str(Self::PREFIX);
        for n in (0..Self::LEN).rev() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "masked to 5 bits"
            )]
            let idx = ((hash >> (n * 5)) & 0x1f) as usize;
            code.push(char::from(Self::ALPHABET[idx]));
        }
        Self(code)
    }

    /// Creates a new [`Code`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        code.as_ref().strip_prefix(Self::PREFIX).is_some_and(|s| {
            s.len() == Self::LEN
                && s.bytes().all(|b| Self::ALPHABET.contains(&b))
        })
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Code`")
    }
}

define_kind! {
    #[doc = "Lifecycle status of a [`Deal`]."]
    enum Status {
        #[doc = "Awaiting the seller's answer."]
        #[wire("pending")]
        Pending = 1,

        #[doc = "Accepted by the seller."]
        #[wire("accepted", "approved")]
        Accepted = 2,

        #[doc = "Rejected by the seller."]
        #[wire("rejected")]
        Rejected = 3,

        #[doc = "Successfully closed."]
        #[wire("completed")]
        Completed = 4,

        #[doc = "Closed without being fulfilled."]
        #[wire("incomplete")]
        Incomplete = 5,

        #[doc = "Withdrawn by one of the parties."]
        #[wire("cancelled")]
        Cancelled = 6,
    }
}

impl Status {
    /// Returns all the [`Status`]es this one may move into.
    #[must_use]
    pub const fn targets(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Cancelled],
            Self::Accepted => {
                &[Self::Completed, Self::Incomplete, Self::Cancelled]
            }
            Self::Rejected
            | Self::Completed
            | Self::Incomplete
            | Self::Cancelled => &[],
        }
    }

    /// Indicates whether this [`Status`] may move into the provided one.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.targets().contains(&to)
    }

    /// Indicates whether this [`Status`] is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.targets().is_empty()
    }

    /// Indicates whether a [`Deal`] in this [`Status`] is still being
    /// negotiated.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

/// Free-text message of a buyer opening a [`Deal`].
///
/// May be empty.
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Message(String);

impl Message {
    /// Creates a new [`Message`] if the given `text` is not too long.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        (text.chars().count() <= 4096).then_some(Self(text))
    }
}

/// Free-form classification of a [`Deal`] (`dealType` on the wire).
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Tag(String);

impl Tag {
    /// [`Tag`] of a [`Deal`] opened without one.
    pub const DEFAULT: &'static str = "inquiry";

    /// Creates a new [`Tag`] if the given `tag` is valid.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        (tag.trim() == tag && !tag.is_empty() && tag.len() <= 64)
            .then_some(Self(tag))
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self(Self::DEFAULT.into())
    }
}

impl FromStr for Tag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Tag`")
    }
}

/// Reason of a [`Deal`] cancellation.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct CancellationReason(String);

impl CancellationReason {
    /// Creates a new [`CancellationReason`] out of the given `text`, trimming
    /// it.
    ///
    /// Returns [`None`] if nothing but whitespace is provided.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Option<Self> {
        let text = text.as_ref().trim();
        (!text.is_empty() && text.chars().count() <= 1024)
            .then(|| Self(text.to_owned()))
    }
}

/// [`User`] taking part in a [`Deal`], as captured when it was opened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Party {
    /// ID of the [`User`].
    pub id: user::Id,

    /// [`user::Name`] of the [`User`].
    pub name: user::Name,

    /// [`user::Email`] of the [`User`].
    pub email: Option<user::Email>,

    /// [`user::Phone`] of the [`User`].
    pub phone: Option<user::Phone>,
}

impl From<&User> for Party {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// Uniqueness key of a [`Deal`].
///
/// At most one [`Deal`] exists per [`Key`], whatever its [`Status`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    /// ID of the buying [`User`].
    pub buyer_id: user::Id,

    /// ID of the selling [`User`].
    pub seller_id: user::Id,

    /// [`Item`] the [`Deal`] is about.
    pub item: item::Ref,
}

/// Monotonically increasing version of a [`Deal`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Into,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(try_from = "i32")]
pub struct Revision(i32);

impl Revision {
    /// [`Revision`] of a freshly opened [`Deal`].
    pub const INITIAL: Self = Self(1);

    /// Creates a new [`Revision`] if the given `value` is positive.
    #[must_use]
    pub const fn new(value: i32) -> Option<Self> {
        if value >= 1 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the [`Revision`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the [`Revision`] preceding this one, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        Self::new(self.0 - 1)
    }
}

impl TryFrom<i32> for Revision {
    type Error = NonPositiveRevision;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveRevision(value))
    }
}

/// Error of a [`Revision`] constructed from a non-positive value.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[display("`Revision` must be positive, got `{_0}`")]
pub struct NonPositiveRevision(#[error(not(source))] i32);

/// Marker type indicating a [`Deal`] completion.
#[derive(Clone, Copy, Debug)]
pub struct Completion;

/// Marker type indicating a [`Deal`] cancellation.
#[derive(Clone, Copy, Debug)]
pub struct Cancellation;

/// [`DateTime`] of a [`Deal`] creation.
pub type CreationDateTime = DateTimeOf<(Deal, unit::Creation)>;

/// [`DateTime`] of the last [`Deal`] update.
pub type UpdateDateTime = DateTimeOf<(Deal, unit::Modification)>;

/// [`DateTime`] of a [`Deal`] completion.
pub type CompletionDateTime = DateTimeOf<(Deal, Completion)>;

/// [`DateTime`] of a [`Deal`] cancellation.
pub type CancellationDateTime = DateTimeOf<(Deal, Cancellation)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use crate::domain::{item, user};

    use super::{
        CancellationReason, Code, Deal, Id, Message, Party, Revision, Status,
        Tag, TransitionError,
    };

    /// Opens a [`Deal`] between freshly created parties.
    pub(crate) fn deal() -> Deal {
        let party = |name: &str| Party {
            id: user::Id::new(),
            name: user::Name::new(name).unwrap(),
            email: None,
            phone: None,
        };
        Deal::open(
            party("Buyer"),
            party("Seller"),
            item::Ref {
                id: item::Id::new(),
                kind: item::Kind::Car,
            },
            item::Snapshot {
                title: item::Title::new("Red sedan").unwrap(),
                price: item::Price::new(Decimal::new(15_000, 0)).unwrap(),
                images: vec![],
                description: item::Description::default(),
                location: item::Location::default(),
            },
            Message::default(),
            Tag::default(),
        )
    }

    #[test]
    fn opens_pending() {
        let deal = deal();

        assert_eq!(deal.status, Status::Pending);
        assert_eq!(deal.revision, Revision::INITIAL);
        assert_eq!(AsRef::<str>::as_ref(&deal.tag), "inquiry");
        assert!(deal.is_active());
        assert!(deal.completed_at.is_none());
        assert!(deal.cancelled_at.is_none());
    }

    #[test]
    fn allows_only_adjacent_transitions() {
        use Status as S;

        let allowed = [
            (S::Pending, S::Accepted),
            (S::Pending, S::Rejected),
            (S::Pending, S::Cancelled),
            (S::Accepted, S::Completed),
            (S::Accepted, S::Incomplete),
            (S::Accepted, S::Cancelled),
        ];
        for &from in S::ALL {
            for &to in S::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}",
                );
            }
        }

        for s in [S::Rejected, S::Completed, S::Incomplete, S::Cancelled] {
            assert!(s.is_terminal(), "{s}");
            assert!(!s.is_active(), "{s}");
        }
    }

    #[test]
    fn accepts_approved_synonym() {
        assert_eq!(Status::from_str("approved").unwrap(), Status::Accepted);
        assert_eq!(Status::Accepted.to_string(), "accepted");
        assert!(Status::from_str("unknown").is_err());
    }

    #[test]
    fn transitions_stamp_timestamps() {
        let mut deal = deal();

        deal.transition(Status::Accepted, None).unwrap();
        assert_eq!(deal.status, Status::Accepted);
        assert_eq!(deal.revision, Revision::INITIAL.next());

        deal.transition(Status::Completed, None).unwrap();
        assert_eq!(deal.status, Status::Completed);
        assert!(deal.completed_at.is_some());
        assert!(
            deal.updated_at.coerce::<()>() >= deal.created_at.coerce::<()>(),
        );
    }

    #[test]
    fn cancel_requires_reason() {
        let mut deal = deal();

        assert_eq!(
            deal.transition(Status::Cancelled, None),
            Err(TransitionError::CancellationReasonRequired),
        );
        assert_eq!(deal.status, Status::Pending);
        assert_eq!(deal.revision, Revision::INITIAL);

        let reason = CancellationReason::new("  changed my mind ").unwrap();
        deal.transition(Status::Cancelled, Some(reason)).unwrap();
        assert_eq!(
            deal.cancellation_reason.as_ref().map(AsRef::<str>::as_ref),
            Some("changed my mind"),
        );
        assert!(deal.cancelled_at.is_some());
    }

    #[test]
    fn terminal_is_closed() {
        let mut deal = deal();
        deal.transition(Status::Rejected, None).unwrap();

        assert_eq!(
            deal.transition(Status::Accepted, None),
            Err(TransitionError::NotAllowed {
                from: Status::Rejected,
                to: Status::Accepted,
            }),
        );
        assert_eq!(deal.status, Status::Rejected);
    }

    #[test]
    fn derives_stable_code() {
        let id = Id::new();
        let code = Code::from_id(id);

        assert_eq!(code, Code::from_id(id));
        assert!(Code::new(code.to_string()).is_some());
        assert!(code.to_string().starts_with("DL-"));
        assert_eq!(code.to_string().len(), 11);

        assert!(Code::new("DL-ABCDEFGI").is_none());
        assert!(Code::new("XX-ABCDEFGH").is_none());
        assert!(Code::new("DL-ABC").is_none());
    }

    #[test]
    fn validates_texts() {
        assert!(CancellationReason::new("   ").is_none());
        assert!(Tag::new("").is_none());
        assert!(Tag::new("offer").is_some());
        assert!(Message::new("").is_some());
        assert!(Message::new("x".repeat(4097)).is_none());
    }

    #[test]
    fn revision_is_positive() {
        assert_eq!(
            serde_json::from_str::<Revision>("3").unwrap(),
            Revision::new(3).unwrap(),
        );
        assert!(serde_json::from_str::<Revision>("0").is_err());
        assert!(serde_json::from_str::<Revision>("-1").is_err());
    }
}
