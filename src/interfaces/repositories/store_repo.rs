use crate::store::SharedStore;

#[derive(Clone)]
pub struct StoreProjectRepo {
    pub store: SharedStore,
}

#[derive(Clone)]
pub struct StoreCommentRepo {
    pub store: SharedStore,
}

#[derive(Clone)]
pub struct StoreDeveloperRepo {
    pub store: SharedStore,
}

#[derive(Clone)]
pub struct StoreUserRepo {
    pub store: SharedStore,
}
