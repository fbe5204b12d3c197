use crate::{
    repositories::store_repo::{StoreCommentRepo, StoreDeveloperRepo, StoreProjectRepo, StoreUserRepo},
    store::SharedStore,
};

/// One repository of each kind over the same store handle.
#[derive(Clone)]
pub struct SharedRepositories {
    pub project_repo: StoreProjectRepo,
    pub developer_repo: StoreDeveloperRepo,
    pub comment_repo: StoreCommentRepo,
    pub user_repo: StoreUserRepo,
}

impl SharedRepositories {
    pub fn new(store: SharedStore) -> Self {
        let project_repo = StoreProjectRepo::new(store.clone());
        let developer_repo = StoreDeveloperRepo::new(store.clone());
        let comment_repo = StoreCommentRepo::new(store.clone());
        let user_repo = StoreUserRepo::new(store);

        SharedRepositories {
            project_repo,
            developer_repo,
            comment_repo,
            user_repo,
        }
    }
}
