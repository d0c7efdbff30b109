use super::delta::ChangeFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;
use crate::user::{AuthToken, AuthTokenValue, PasswordHasherKind};

use rusqlite::{params, OptionalExtension, Row};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        meta: UserMeta { name: row.get(1)? },
        creation_ts: row.get(2)?,
        update_ts: row.get(3)?,
    })
}

/// Stored password credentials of a user.
#[derive(Clone, Debug)]
pub struct PasswordCredentials {
    pub user_id: UserId,
    pub hash: String,
    pub hasher: PasswordHasherKind,
}

impl LibraryTx<'_> {
    fn check_user_name(&self, name: &str, except_user_id: Option<&str>) -> StoreResult<()> {
        if name.trim().is_empty() {
            return Err(StoreError::validation("user name cannot be empty"));
        }
        let holder: Option<String> = self
            .conn
            .query_row(
                "SELECT user_id FROM user WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match holder {
            Some(holder) if Some(holder.as_str()) != except_user_id => Err(
                StoreError::validation(format!("user name '{}' is already taken", name)),
            ),
            _ => Ok(()),
        }
    }

    fn write_password_hash(&self, user_id: &str, hash: &str, ts: i64) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_password_credentials (user_id, hash, hasher, created)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, hash, PasswordHasherKind::Argon2.to_string(), ts],
        )?;
        Ok(())
    }

    pub fn read_users(&self, filter: &ChangeFilter) -> StoreResult<Vec<User>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT user_id, name, creation_ts, update_ts FROM user
             WHERE update_ts >= ?1 ORDER BY update_ts ASC, user_id ASC",
        )?;
        let users = stmt
            .query_map(params![filter.from_ts_or_zero()], parse_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn read_user(&self, user_id: &str) -> StoreResult<User> {
        self.conn
            .query_row(
                "SELECT user_id, name, creation_ts, update_ts FROM user WHERE user_id = ?1",
                params![user_id],
                parse_user_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::User, user_id))
    }

    pub fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT user_id, name, creation_ts, update_ts FROM user WHERE name = ?1",
                params![name],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    /// `password_hash` is computed by the caller, outside the transaction.
    pub fn create_user_with_hash(
        &self,
        name: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<User> {
        self.check_user_name(name, None)?;
        let now = self.now();
        let user = User {
            id: self.generate_id(EntityKind::User)?,
            creation_ts: now,
            update_ts: now,
            meta: UserMeta {
                name: name.to_string(),
            },
        };
        self.conn.execute(
            "INSERT INTO user (user_id, name, creation_ts, update_ts) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.meta.name, user.creation_ts, user.update_ts],
        )?;
        if let Some(hash) = password_hash {
            self.write_password_hash(&user.id, hash, now)?;
        }
        Ok(user)
    }

    /// Credentials are replaced only when `password_hash` is given.
    pub fn update_user_with_hash(
        &self,
        user_id: &str,
        name: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<User> {
        let mut user = self.read_user(user_id)?;
        self.check_user_name(name, Some(user_id))?;
        user.update_ts = self.now();
        user.meta.name = name.to_string();
        self.conn.execute(
            "UPDATE user SET name = ?1, update_ts = ?2 WHERE user_id = ?3",
            params![user.meta.name, user.update_ts, user_id],
        )?;
        if let Some(hash) = password_hash {
            self.write_password_hash(user_id, hash, user.update_ts)?;
        }
        Ok(user)
    }

    /// Removes the user from playlist owners (ownership is not content, so
    /// only `update_ts` moves), tombstones their favorites and drops their
    /// credentials and tokens.
    pub fn delete_user(&self, user_id: &str) -> StoreResult<User> {
        let user = self.read_user(user_id)?;
        let now = self.now();

        self.conn.execute(
            "UPDATE playlist SET update_ts = ?1
             WHERE playlist_id IN (SELECT playlist_id FROM playlist_owned_user WHERE user_id = ?2)",
            params![now, user_id],
        )?;
        self.conn.execute(
            "INSERT OR REPLACE INTO deleted_favorite_playlist (user_id, playlist_id, delete_ts)
             SELECT user_id, playlist_id, ?1 FROM favorite_playlist WHERE user_id = ?2",
            params![now, user_id],
        )?;
        self.conn
            .execute("DELETE FROM user WHERE user_id = ?1", params![user_id])?;
        self.write_tombstone(EntityKind::User, user_id, now)?;
        Ok(user)
    }

    pub fn read_password_credentials(&self, name: &str) -> StoreResult<Option<PasswordCredentials>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT c.user_id, c.hash, c.hasher FROM user_password_credentials c
                 JOIN user u ON u.user_id = c.user_id WHERE u.name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(|(user_id, hash, hasher)| {
            Ok(PasswordCredentials {
                user_id,
                hash,
                hasher: hasher.parse()?,
            })
        })
        .transpose()
    }

    pub fn add_auth_token(&self, user_id: &str) -> StoreResult<AuthToken> {
        let token = AuthToken {
            value: AuthTokenValue::generate(),
            user_id: user_id.to_string(),
            created: self.now(),
        };
        self.conn.execute(
            "INSERT INTO auth_token (value, user_id, created) VALUES (?1, ?2, ?3)",
            params![token.value.0, token.user_id, token.created],
        )?;
        Ok(token)
    }

    pub fn read_auth_token(&self, value: &AuthTokenValue) -> StoreResult<Option<AuthToken>> {
        let token = self
            .conn
            .query_row(
                "SELECT value, user_id, created FROM auth_token WHERE value = ?1",
                params![value.0],
                |row| {
                    Ok(AuthToken {
                        value: AuthTokenValue(row.get(0)?),
                        user_id: row.get(1)?,
                        created: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    pub fn delete_auth_token(&self, value: &AuthTokenValue) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM auth_token WHERE value = ?1", params![value.0])?;
        Ok(deleted > 0)
    }

    /// Drops tokens created before `created_before`, returns how many.
    pub fn prune_auth_tokens(&self, created_before: i64) -> StoreResult<usize> {
        let pruned = self.conn.execute(
            "DELETE FROM auth_token WHERE created < ?1",
            params![created_before],
        )?;
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::super::store::SqliteLibraryStore;
    use super::*;

    #[test]
    fn names_must_be_unique_and_non_empty() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let bob = store
            .write(|tx| tx.create_user_with_hash("bob", None))
            .unwrap();
        let err = store
            .write(|tx| tx.create_user_with_hash("bob", None))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = store
            .write(|tx| tx.create_user_with_hash("  ", None))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // renaming to its own name is fine
        let renamed = store
            .write(|tx| tx.update_user_with_hash(&bob.id, "bob", None))
            .unwrap();
        assert!(renamed.update_ts > bob.update_ts);
    }

    #[test]
    fn credentials_follow_the_user_name() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let user = store
            .write(|tx| tx.create_user_with_hash("alice", Some("$argon2id$fake")))
            .unwrap();
        let creds = store
            .read(|tx| tx.read_password_credentials("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(creds.user_id, user.id);
        assert_eq!(creds.hasher, PasswordHasherKind::Argon2);
        assert!(store
            .read(|tx| tx.read_password_credentials("nobody"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn tokens_are_stored_and_revoked() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let user = store
            .write(|tx| tx.create_user_with_hash("t", None))
            .unwrap();
        let token = store.write(|tx| tx.add_auth_token(&user.id)).unwrap();
        assert_eq!(
            store.read(|tx| tx.read_auth_token(&token.value)).unwrap(),
            Some(token.clone())
        );
        assert!(store.write(|tx| tx.delete_auth_token(&token.value)).unwrap());
        assert!(store
            .read(|tx| tx.read_auth_token(&token.value))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_user_cascades_to_owners_favorites_and_tokens() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let user = store
            .write(|tx| tx.create_user_with_hash("leaving", Some("$argon2id$fake")))
            .unwrap();
        let token = store.write(|tx| tx.add_auth_token(&user.id)).unwrap();
        let playlist = store
            .write(|tx| {
                tx.create_playlist(
                    &PlaylistMeta {
                        name: "mine".into(),
                        owner_user_ids: vec![user.id.clone()],
                        song_ids: vec![],
                    },
                    true,
                )
            })
            .unwrap();
        store
            .write(|tx| {
                tx.create_favorite_playlist(&FavoritePlaylistId::new(&user.id, &playlist.id), true)
            })
            .unwrap();

        store.write(|tx| tx.delete_user(&user.id)).unwrap();

        let after = store.read(|tx| tx.read_playlist(&playlist.id)).unwrap();
        assert!(after.meta.owner_user_ids.is_empty());
        assert!(after.update_ts > playlist.update_ts);
        assert_eq!(after.content_update_ts, playlist.content_update_ts);
        assert!(store
            .read(|tx| tx.read_auth_token(&token.value))
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .read(|tx| tx.read_favorite_playlist_tombstones(None))
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .read(|tx| tx.read_password_credentials("leaving"))
            .unwrap()
            .is_none());
    }
}
