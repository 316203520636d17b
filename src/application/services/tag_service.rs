//! Tag management service.

use std::sync::Arc;

use serde_json::{Value, json};
use validator::Validate;

use crate::api::dto::pagination::CollectionResult;
use crate::api::dto::tags::{TagDto, UpsertTagDto};
use crate::application::services::habit_service::evict_user_habits;
use crate::application::services::query::{check_fields, shape_item};
use crate::domain::entities::{NewTag, TagChanges, new_id};
use crate::domain::repositories::TagRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::hateoas::{LinkBuilder, LinkDto, rel};

pub struct TagService {
    tags: Arc<dyn TagRepository>,
    cache: Arc<dyn CacheService>,
    links: LinkBuilder,
}

impl TagService {
    pub fn new(
        tags: Arc<dyn TagRepository>,
        cache: Arc<dyn CacheService>,
        links: LinkBuilder,
    ) -> Self {
        Self { tags, cache, links }
    }

    /// Lists all of the user's tags, ordered by name.
    pub async fn list(
        &self,
        user_id: &str,
        fields: Option<&str>,
        hateoas: bool,
    ) -> Result<CollectionResult<Value>, AppError> {
        check_fields::<TagDto>(fields)?;

        let data = self
            .tags
            .list(user_id)
            .await?
            .into_iter()
            .map(|tag| {
                let links = hateoas.then(|| self.tag_links(&tag.id, fields));
                shape_item(&TagDto::from(tag), fields, links)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let links = hateoas.then(|| {
            vec![
                self.links.link(
                    "/api/tags",
                    &[("fields", fields.map(str::to_string))],
                    rel::SELF,
                    "GET",
                ),
                self.links.simple("/api/tags", rel::CREATE, "POST"),
            ]
        });

        Ok(CollectionResult { data, links })
    }

    pub async fn get(
        &self,
        user_id: &str,
        id: &str,
        fields: Option<&str>,
        hateoas: bool,
    ) -> Result<Value, AppError> {
        check_fields::<TagDto>(fields)?;

        let tag = self
            .tags
            .find_by_id(user_id, id)
            .await?
            .ok_or_else(|| tag_not_found(id))?;

        let links = hateoas.then(|| self.tag_links(id, fields));
        shape_item(&TagDto::from(tag), fields, links)
    }

    /// Creates a tag.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the user already has a tag with this name.
    pub async fn create(&self, user_id: &str, mut dto: UpsertTagDto) -> Result<TagDto, AppError> {
        dto.name = dto.name.trim().to_string();
        dto.validate()?;
        let name = dto.name;

        if self.tags.find_by_name(user_id, &name).await?.is_some() {
            return Err(duplicate_name(&name));
        }

        let tag = self
            .tags
            .create(NewTag {
                id: new_id("t"),
                user_id: user_id.to_string(),
                name,
                description: dto.description,
            })
            .await?;

        tracing::info!(user_id, tag_id = %tag.id, "Tag created");
        Ok(TagDto::from(tag))
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        mut dto: UpsertTagDto,
    ) -> Result<(), AppError> {
        dto.name = dto.name.trim().to_string();
        dto.validate()?;
        let name = dto.name;

        if let Some(existing) = self.tags.find_by_name(user_id, &name).await?
            && existing.id != id
        {
            return Err(duplicate_name(&name));
        }

        let changes = TagChanges {
            name,
            description: dto.description,
        };
        if !self.tags.update(user_id, id, changes).await? {
            return Err(tag_not_found(id));
        }

        evict_user_habits(self.cache.as_ref(), user_id).await;
        Ok(())
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        if !self.tags.delete(user_id, id).await? {
            return Err(tag_not_found(id));
        }

        evict_user_habits(self.cache.as_ref(), user_id).await;
        Ok(())
    }

    pub fn tag_links(&self, id: &str, fields: Option<&str>) -> Vec<LinkDto> {
        let path = format!("/api/tags/{id}");
        vec![
            self.links.link(
                &path,
                &[("fields", fields.map(str::to_string))],
                rel::SELF,
                "GET",
            ),
            self.links.simple(&path, rel::UPDATE, "PUT"),
            self.links.simple(&path, rel::DELETE, "DELETE"),
        ]
    }
}

fn tag_not_found(id: &str) -> AppError {
    AppError::not_found("Tag not found", json!({ "id": id }))
}

fn duplicate_name(name: &str) -> AppError {
    AppError::conflict(
        format!("The tag '{name}' already exists"),
        json!({ "name": name }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Tag;
    use crate::domain::repositories::MockTagRepository;
    use crate::infrastructure::cache::NullCache;
    use chrono::Utc;

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            user_id: "u_1".to_string(),
            name: name.to_string(),
            description: None,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
        }
    }

    fn service(tags: MockTagRepository) -> TagService {
        TagService::new(
            Arc::new(tags),
            Arc::new(NullCache),
            LinkBuilder::new("http://localhost:5000"),
        )
    }

    fn upsert(name: &str) -> UpsertTagDto {
        UpsertTagDto {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_name_conflicts() {
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_name()
            .returning(|_, name| Ok(Some(tag("t_1", name))));
        tags.expect_create().times(0);

        let err = service(tags).create("u_1", upsert("health")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_create_trims_name() {
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_name().returning(|_, _| Ok(None));
        tags.expect_create()
            .withf(|t| t.name == "health" && t.id.starts_with("t_"))
            .returning(|t| Ok(tag(&t.id, &t.name)));

        let dto = service(tags).create("u_1", upsert("  health ")).await.unwrap();
        assert_eq!(dto.name, "health");
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_name().times(0);
        tags.expect_create().times(0);
        tags.expect_update().times(0);
        let svc = service(tags);

        let err = svc.create("u_1", upsert("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = svc.update("u_1", "t_1", upsert(" \t ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_allows_keeping_own_name() {
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_name()
            .returning(|_, name| Ok(Some(tag("t_1", name))));
        tags.expect_update().times(1).returning(|_, _, _| Ok(true));

        service(tags)
            .update("u_1", "t_1", upsert("health"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_to_other_tags_name_conflicts() {
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_name()
            .returning(|_, name| Ok(Some(tag("t_2", name))));
        tags.expect_update().times(0);

        let err = service(tags)
            .update("u_1", "t_1", upsert("health"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_tag() {
        let mut tags = MockTagRepository::new();
        tags.expect_delete().returning(|_, _| Ok(false));

        let err = service(tags).delete("u_1", "t_9").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_with_links() {
        let mut tags = MockTagRepository::new();
        tags.expect_list()
            .returning(|_| Ok(vec![tag("t_1", "health"), tag("t_2", "work")]));

        let result = service(tags).list("u_1", Some("id,name"), true).await.unwrap();
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data[0]["name"], "health");
        assert!(result.data[0].get("createdAtUtc").is_none());
        assert_eq!(result.data[1]["links"][0]["href"], "http://localhost:5000/api/tags/t_2?fields=id%2Cname");
        let rels: Vec<_> = result.links.unwrap().into_iter().map(|l| l.rel).collect();
        assert_eq!(rels, vec!["self", "create"]);
    }
}
