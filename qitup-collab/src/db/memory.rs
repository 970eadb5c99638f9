use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use qitup_core::PlayerKind;

use crate::util::random_string;

use super::{
    AttendeeData, Database, DatabaseError, NewParty, NewUser, PartyData, PrimaryKey, Result,
    UserData,
};

const ID_LENGTH: usize = 24;
const TOKEN_LENGTH: usize = 48;

/// A [Database] kept in process memory.
#[derive(Default)]
pub struct MemoryDatabase {
    users: DashMap<PrimaryKey, UserData>,
    /// User ids by authentication token
    tokens: DashMap<String, PrimaryKey>,
    parties: DashMap<PrimaryKey, PartyData>,
    /// Party ids by join code
    join_codes: DashMap<String, PrimaryKey>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_not_found() -> DatabaseError {
        DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        }
    }

    fn party_not_found() -> DatabaseError {
        DatabaseError::NotFound {
            resource: "party",
            identifier: "id",
        }
    }

    fn update_party<F>(&self, party_id: &str, update: F) -> Result<PartyData>
    where
        F: FnOnce(&mut PartyData),
    {
        let mut party = self
            .parties
            .get_mut(party_id)
            .ok_or_else(Self::party_not_found)?;

        update(&mut party);
        Ok(party.clone())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.users
            .get(user_id)
            .map(|u| u.clone())
            .ok_or_else(Self::user_not_found)
    }

    async fn user_by_token(&self, token: &str) -> Result<UserData> {
        let user_id = self
            .tokens
            .get(token)
            .map(|id| id.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "token",
            })?;

        self.user_by_id(&user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let user = UserData {
            id: random_string(ID_LENGTH),
            display_name: new_user.display_name,
            token: random_string(TOKEN_LENGTH),
            identities: Default::default(),
        };

        self.tokens.insert(user.token.clone(), user.id.clone());
        self.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn set_identity(&self, user_id: &str, provider: PlayerKind, token: String) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(Self::user_not_found)?;

        user.identities.insert(provider, token);
        Ok(())
    }

    async fn party_by_id(&self, party_id: &str) -> Result<PartyData> {
        self.parties
            .get(party_id)
            .map(|p| p.clone())
            .ok_or_else(Self::party_not_found)
    }

    async fn party_by_join_code(&self, join_code: &str) -> Result<PartyData> {
        let party_id = self
            .join_codes
            .get(join_code)
            .map(|id| id.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "party",
                identifier: "join_code",
            })?;

        self.party_by_id(&party_id).await
    }

    async fn list_parties(&self) -> Result<Vec<PartyData>> {
        Ok(self.parties.iter().map(|p| p.clone()).collect())
    }

    async fn create_party(&self, new_party: NewParty) -> Result<PartyData> {
        let host = self.user_by_id(&new_party.host_id).await?;
        let party_id = random_string(ID_LENGTH);

        match self.join_codes.entry(new_party.join_code.clone()) {
            Entry::Occupied(_) => {
                return Err(DatabaseError::Conflict {
                    resource: "party",
                    field: "join_code",
                    value: new_party.join_code,
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(party_id.clone());
            }
        }

        let party = PartyData {
            id: party_id.clone(),
            host: host.profile(),
            attendees: vec![],
            join_code: new_party.join_code,
            name: new_party.name,
            created_at: Utc::now(),
            settings: new_party.settings,
        };

        self.parties.insert(party_id, party.clone());
        Ok(party)
    }

    async fn add_attendee(&self, party_id: &str, user_id: &str) -> Result<PartyData> {
        let user = self.user_by_id(user_id).await?;

        self.update_party(party_id, |party| {
            if !party.is_member(user_id) {
                party.attendees.push(AttendeeData {
                    user: user.profile(),
                    joined_at: Utc::now(),
                });
            }
        })
    }

    async fn remove_attendee(&self, party_id: &str, user_id: &str) -> Result<PartyData> {
        self.update_party(party_id, |party| {
            party.attendees.retain(|a| a.user.id != user_id);
        })
    }

    async fn transfer_host(&self, party_id: &str, user_id: &str) -> Result<PartyData> {
        let user = self.user_by_id(user_id).await?;

        self.update_party(party_id, |party| {
            if party.is_host(user_id) {
                return;
            }

            party.attendees.retain(|a| a.user.id != user_id);

            let previous = std::mem::replace(&mut party.host, user.profile());
            party.attendees.push(AttendeeData {
                user: previous,
                joined_at: Utc::now(),
            });
        })
    }

    async fn delete_party(&self, party_id: &str) -> Result<()> {
        let (_, party) = self
            .parties
            .remove(party_id)
            .ok_or_else(Self::party_not_found)?;

        self.join_codes.remove(&party.join_code);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::PartySettings;

    use super::*;

    async fn user(db: &MemoryDatabase, name: &str) -> UserData {
        db.create_user(NewUser {
            display_name: name.into(),
        })
        .await
        .unwrap()
    }

    async fn party(db: &MemoryDatabase, host: &UserData, code: &str) -> Result<PartyData> {
        db.create_party(NewParty {
            name: "Friday".into(),
            join_code: code.into(),
            settings: PartySettings::default(),
            host_id: host.id.clone(),
        })
        .await
    }

    #[tokio::test]
    async fn test_join_code_is_unique() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;

        let created = party(&db, &host, "ABCD").await.unwrap();
        let duplicate = party(&db, &host, "ABCD").await;

        assert!(matches!(
            duplicate,
            Err(DatabaseError::Conflict {
                field: "join_code",
                ..
            })
        ));

        // The code is free again once the party is gone
        db.delete_party(&created.id).await.unwrap();
        assert!(party(&db, &host, "ABCD").await.is_ok());
    }

    #[tokio::test]
    async fn test_attendees_are_not_duplicated() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;
        let guest = user(&db, "guest").await;
        let party = party(&db, &host, "ABCD").await.unwrap();

        db.add_attendee(&party.id, &guest.id).await.unwrap();
        db.add_attendee(&party.id, &guest.id).await.unwrap();
        let updated = db.add_attendee(&party.id, &host.id).await.unwrap();

        assert_eq!(updated.attendees.len(), 1);
        assert_eq!(updated.attendees[0].user.id, guest.id);

        let updated = db.remove_attendee(&party.id, &guest.id).await.unwrap();
        assert!(updated.attendees.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_host() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;
        let guest = user(&db, "guest").await;
        let party = party(&db, &host, "ABCD").await.unwrap();

        db.add_attendee(&party.id, &guest.id).await.unwrap();
        let updated = db.transfer_host(&party.id, &guest.id).await.unwrap();

        assert!(updated.is_host(&guest.id));
        assert_eq!(updated.attendees.len(), 1);
        assert_eq!(updated.attendees[0].user.id, host.id);
    }

    #[tokio::test]
    async fn test_lookups() {
        let db = MemoryDatabase::new();
        let host = user(&db, "host").await;
        let party = party(&db, &host, "ABCD").await.unwrap();

        assert_eq!(db.user_by_token(&host.token).await.unwrap().id, host.id);
        assert_eq!(db.party_by_join_code("ABCD").await.unwrap().id, party.id);
        assert!(matches!(
            db.party_by_join_code("NOPE").await,
            Err(DatabaseError::NotFound { .. })
        ));

        db.set_identity(&host.id, PlayerKind::Spotify, "abc".into())
            .await
            .unwrap();
        let host = db.user_by_id(&host.id).await.unwrap();
        assert_eq!(host.identities.get(&PlayerKind::Spotify).unwrap(), "abc");
    }
}
