//! Business logic services

pub mod books;
pub mod clubs;
pub mod covers;
pub mod email;
pub mod http;
pub mod messages;
pub mod metadata;
pub mod notifications;
pub mod redis;
pub mod uploads;
pub mod users;
pub mod vision;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub users: users::UsersService,
    pub books: books::BooksService,
    pub clubs: clubs::ClubsService,
    pub notifications: notifications::NotificationsService,
    pub messages: messages::MessagesService,
    pub metadata: metadata::MetadataService,
    pub covers: covers::CoversService,
    pub uploads: uploads::UploadsService,
    pub redis: redis::RedisService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        redis_service: redis::RedisService,
    ) -> AppResult<Self> {
        let email = email::EmailService::new(config.email.clone());
        let uploads = uploads::UploadsService::new(config.uploads.clone());
        let notifications = notifications::NotificationsService::new(repository.clone(), email);
        let metadata = metadata::MetadataService::new(
            config.metadata.clone(),
            &config.redis,
            redis_service.clone(),
        )?;
        let books = books::BooksService::new(repository.clone(), notifications.clone(), uploads.clone());
        let analyzer = vision::CoverAnalyzer::from_config(&config.vision, Arc::new(metadata.clone()))?;

        Ok(Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            clubs: clubs::ClubsService::new(repository.clone(), notifications.clone()),
            messages: messages::MessagesService::new(repository.clone(), notifications.clone()),
            covers: covers::CoversService::new(analyzer, books.clone(), uploads.clone()),
            books,
            notifications,
            metadata,
            uploads,
            redis: redis_service,
            repository,
        })
    }
}
