//! A client for querying GraphQL event indexes.

use {
    anyhow::{Result, bail},
    reqwest::{Client, Url},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
    thiserror::Error,
};

/// A general client for querying a GraphQL event index.
pub struct SubgraphClient {
    client: Client,
    subgraph_url: Url,
}

impl SubgraphClient {
    /// Creates a new client querying the given endpoint.
    pub fn new(subgraph_url: Url, client: Client) -> Self {
        Self {
            client,
            subgraph_url,
        }
    }

    /// Performs the specified GraphQL query on the current index.
    pub async fn query<T>(&self, query: &str, variables: Option<Map<String, Value>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.client
            .post(self.subgraph_url.clone())
            .json(&Query { query, variables })
            .send()
            .await?
            .error_for_status()?
            .json::<QueryResponse<T>>()
            .await?
            .into_result()
    }
}

/// A GraphQL query.
#[derive(Serialize)]
struct Query<'a> {
    query: &'a str,
    variables: Option<Map<String, Value>>,
}

/// A GraphQL query response.
///
/// This type gets converted into a Rust `Result` type, while handling invalid
/// responses (with missing data and errors).
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    #[serde(default = "empty_data")]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<QueryError>>,
}

impl<T> QueryResponse<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Self {
                data: Some(data),
                errors: None,
            } => Ok(data),
            Self {
                errors: Some(errors),
                data: None,
            } if !errors.is_empty() => {
                // Make sure to log additional errors if there are more than
                // one, and just bubble up the first error.
                for error in &errors[1..] {
                    tracing::warn!("additional GraphQL error: {}", error.message);
                }
                bail!("{}", errors[0])
            }
            _ => bail!("invalid GraphQL response"),
        }
    }
}

#[derive(Debug, Deserialize, Error)]
#[error("{}", .message)]
struct QueryError {
    message: String,
}

/// Function to work around the fact that `#[serde(default)]` on an `Option<T>`
/// requires `T: Default`.
fn empty_data<T>() -> Option<T> {
    None
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn serialize_query() {
        let mut variables = Map::new();
        variables.insert("foo".to_string(), json!("bar"));
        variables.insert("baz".to_string(), json!(42));
        assert_eq!(
            serde_json::to_value(Query {
                query: "foo { id }",
                variables: Some(variables),
            })
            .unwrap(),
            json!({
                "query": "foo { id }",
                "variables": {
                    "foo": "bar",
                    "baz": 42,
                },
            }),
        );
    }

    fn response_from_json<T>(value: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value::<QueryResponse<T>>(value)
            .unwrap()
            .into_result()
    }

    #[test]
    fn deserialize_successful_response() {
        assert!(response_from_json::<bool>(json!({ "data": true })).unwrap());
    }

    #[test]
    fn deserialize_error_response() {
        assert_eq!(
            response_from_json::<bool>(json!({
                "data": null,
                "errors": [{"message": "foo"}],
            }))
            .unwrap_err()
            .to_string(),
            "foo",
        );
        assert_eq!(
            response_from_json::<bool>(json!({
                "errors": [{"message": "bar"}],
            }))
            .unwrap_err()
            .to_string(),
            "bar",
        );
    }

    #[test]
    fn deserialize_multi_error_response() {
        assert_eq!(
            response_from_json::<bool>(json!({
                "data": null,
                "errors": [
                    {"message": "foo"},
                    {"message": "bar"},
                ],
            }))
            .unwrap_err()
            .to_string(),
            "foo",
        );
    }

    #[test]
    fn deserialize_invalid_response() {
        assert!(
            response_from_json::<bool>(json!({
                "data": null,
                "errors": null,
            }))
            .is_err()
        );
        assert!(
            response_from_json::<bool>(json!({
                "data": null,
                "errors": [],
            }))
            .is_err()
        );
        assert!(
            response_from_json::<bool>(json!({
                "data": true,
                "errors": [],
            }))
            .is_err()
        );
        assert!(
            response_from_json::<bool>(json!({
                "data": true,
                "errors": [{"message":"bad"}],
            }))
            .is_err()
        );
    }
}
