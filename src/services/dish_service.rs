use std::sync::Arc;
use tracing::instrument;

use crate::config::PaginationConfig;
use crate::models::{
    normalize_search, CreateDishRequest, Dish, DishFilters, Page, PageQuery, RepositoryError,
    ServiceError, ServiceResult, UpdateDishRequest, Validate,
};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::DishRepository;

/// Menu browsing and dish management
pub struct DishService {
    repository: Arc<dyn DishRepository>,
    page_size: u32,
    tracer: BusinessTracingMiddleware,
}

impl DishService {
    pub fn new(
        repository: Arc<dyn DishRepository>,
        pagination: &PaginationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            page_size: pagination.menu_page_size,
            tracer: BusinessTracingMiddleware::new(metrics),
        }
    }

    /// One page of the menu, ordered by name, optionally narrowed by a name search
    #[instrument(skip(self), fields(page = ?query.page, search = ?query.search))]
    pub async fn list_menu(&self, query: PageQuery) -> ServiceResult<Page<Dish>> {
        crate::info_with_trace!("Listing menu");

        let filters = DishFilters {
            search_term: normalize_search(query.search),
            ..Default::default()
        };
        let dishes = self.repository.find_all(filters).await?;

        let page = Page::paginate(dishes, query.page.unwrap_or(1), self.page_size)?;
        crate::info_with_trace!(
            "Menu page {} of {} with {} dishes",
            page.page,
            page.num_pages,
            page.items.len()
        );
        Ok(page)
    }

    /// Every dish matching the filters, ordered by name
    #[instrument(skip(self), fields(filters = ?filters))]
    pub async fn list_dishes(&self, filters: DishFilters) -> ServiceResult<Vec<Dish>> {
        let filters = DishFilters {
            search_term: normalize_search(filters.search_term),
            ..filters
        };
        let dishes = self.repository.find_all(filters).await?;

        crate::info_with_trace!("Found {} dishes matching criteria", dishes.len());
        Ok(dishes)
    }

    #[instrument(skip(self), fields(dish_id = %id))]
    pub async fn get_dish(&self, id: &str) -> ServiceResult<Dish> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::DishNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, request), fields(name = %request.name, price = %request.price))]
    pub async fn create_dish(&self, request: CreateDishRequest) -> ServiceResult<Dish> {
        self.tracer
            .trace_catalog_operation("dish", "create", async {
                request.validate()?;

                let dish = self.repository.create(Dish::new(request)).await?;
                crate::info_with_trace!(dish_id = %dish.id, "Dish created");
                Ok::<_, ServiceError>(dish)
            })
            .await
    }

    #[instrument(skip(self, request), fields(dish_id = %id))]
    pub async fn update_dish(&self, id: &str, request: UpdateDishRequest) -> ServiceResult<Dish> {
        self.tracer
            .trace_catalog_operation("dish", "update", async {
                request.validate()?;

                let mut dish = self.get_dish(id).await?;
                dish.update(request);

                let dish = self.repository.update(dish).await.map_err(|e| match e {
                    RepositoryError::NotFound => ServiceError::DishNotFound { id: id.to_string() },
                    other => other.into(),
                })?;
                crate::info_with_trace!("Dish updated");
                Ok::<_, ServiceError>(dish)
            })
            .await
    }

    /// Delete a dish. Carts still holding it drop the line when next repriced.
    #[instrument(skip(self), fields(dish_id = %id))]
    pub async fn delete_dish(&self, id: &str) -> ServiceResult<()> {
        self.tracer
            .trace_catalog_operation("dish", "delete", async {
                self.get_dish(id).await?;
                self.repository.delete(id).await?;

                crate::info_with_trace!("Dish deleted");
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.repository.count().await?)
    }
}
