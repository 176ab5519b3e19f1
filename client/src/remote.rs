//! [`Remote`] definitions.

use derive_more::Debug;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use service::domain::deal;
use tracing as log;

use crate::{
    wire::{self, CreateRequest, UpdateRequest},
    Deal, Error,
};

/// Operation executed against the deal HTTP API.
pub use common::Handler as Remote;

/// Lists all the [`Deal`]s visible to the signed-in user.
#[derive(Clone, Copy, Debug)]
pub struct ListDeals;

/// Opens a new [`Deal`].
#[derive(Clone, Debug)]
pub struct CreateDeal(pub CreateRequest);

/// Moves a [`Deal`] into another status.
#[derive(Clone, Debug)]
pub struct UpdateStatus {
    /// ID of the [`Deal`] to update.
    pub id: deal::Id,

    /// Body of the request.
    pub request: UpdateRequest,
}

/// [`Remote`] talking to the deal HTTP API over HTTP.
#[derive(Clone, Debug)]
pub struct Http {
    /// Underlying HTTP client.
    client: reqwest::Client,

    /// Base URL of the API, without a trailing slash.
    base_url: String,

    /// Bearer token of the signed-in user.
    #[debug(skip)]
    token: Option<String>,
}

impl Http {
    /// Creates a new [`Http`] remote for the API at the provided `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            _ = base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: None,
        }
    }

    /// Sets the bearer token to authorize requests with.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Sends the provided request and decodes its response.
async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
    let resp = req.send().await?;
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    log::debug!("received `{status}` response of {} bytes", body.len());
    wire::decode(status, &body)
}

impl Remote<ListDeals> for Http {
    type Ok = Vec<Deal>;
    type Err = Error;

    async fn execute(&self, _: ListDeals) -> Result<Self::Ok, Self::Err> {
        let many: wire::Many =
            send(self.request(Method::GET, "/deals")).await?;
        Ok(many.deals.into_iter().map(Into::into).collect())
    }
}

impl Remote<CreateDeal> for Http {
    type Ok = Deal;
    type Err = Error;

    async fn execute(
        &self,
        CreateDeal(body): CreateDeal,
    ) -> Result<Self::Ok, Self::Err> {
        let one: wire::One =
            send(self.request(Method::POST, "/deals").json(&body)).await?;
        Ok(one.deal.into())
    }
}

impl Remote<UpdateStatus> for Http {
    type Ok = Deal;
    type Err = Error;

    async fn execute(&self, op: UpdateStatus) -> Result<Self::Ok, Self::Err> {
        let one: wire::One = send(
            self.request(Method::PUT, &format!("/deals/{}", op.id))
                .json(&op.request),
        )
        .await?;
        Ok(one.deal.into())
    }
}
