use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    normalize_search, CreateUserRequest, RepositoryError, ServiceError, ServiceResult,
    UpdateUserRequest, User, Validate,
};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::{CartRepository, OrderRepository, UserRepository};

/// Customer records. Deleting a user removes their carts and orders too.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    cart_repository: Arc<dyn CartRepository>,
    order_repository: Arc<dyn OrderRepository>,
    tracer: BusinessTracingMiddleware,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        cart_repository: Arc<dyn CartRepository>,
        order_repository: Arc<dyn OrderRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            cart_repository,
            order_repository,
            tracer: BusinessTracingMiddleware::new(metrics),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, search: Option<String>) -> ServiceResult<Vec<User>> {
        let users = self.repository.find_all(normalize_search(search)).await?;
        crate::info_with_trace!("Found {} users", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &str) -> ServiceResult<User> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: CreateUserRequest) -> ServiceResult<User> {
        self.tracer
            .trace_catalog_operation("user", "create", async {
                request.validate()?;

                let user = self
                    .repository
                    .create(User::new(request))
                    .await
                    .map_err(duplicate_to_service_error)?;
                crate::info_with_trace!(user_id = %user.id, "User created");
                Ok::<_, ServiceError>(user)
            })
            .await
    }

    #[instrument(skip(self, request), fields(user_id = %id))]
    pub async fn update_user(&self, id: &str, request: UpdateUserRequest) -> ServiceResult<User> {
        self.tracer
            .trace_catalog_operation("user", "update", async {
                request.validate()?;

                let previous = self.get_user(id).await?;
                let mut user = previous.clone();
                user.update(request);

                let user = self
                    .repository
                    .update(&previous, user)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::NotFound => {
                            ServiceError::UserNotFound { id: id.to_string() }
                        }
                        other => duplicate_to_service_error(other),
                    })?;
                crate::info_with_trace!("User updated");
                Ok::<_, ServiceError>(user)
            })
            .await
    }

    /// Delete a user together with their carts and orders
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &str) -> ServiceResult<()> {
        self.tracer
            .trace_catalog_operation("user", "delete", async {
                let user = self.get_user(id).await?;

                let carts = self.cart_repository.delete_by_user(id).await?;
                let orders = self.order_repository.delete_by_user(id).await?;
                self.repository.delete(&user).await?;

                crate::info_with_trace!(
                    deleted_carts = carts,
                    deleted_orders = orders,
                    "User deleted"
                );
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.repository.count().await?)
    }
}

fn duplicate_to_service_error(error: RepositoryError) -> ServiceError {
    match error {
        RepositoryError::DuplicateKey { field } => ServiceError::DuplicateUser { field },
        other => other.into(),
    }
}
