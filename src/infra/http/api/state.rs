use std::sync::Arc;

use crate::application::posts::PostSearchService;

#[derive(Clone)]
pub struct ApiState {
    pub search: Arc<PostSearchService>,
}
