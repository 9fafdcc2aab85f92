use crate::{DeploymentTarget, FunctionRef, RotateError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::config::Region;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::Environment;
use std::collections::HashMap;

/// Rewrites the environment of an AWS Lambda function. Credentials come from
/// the default AWS provider chain.
#[derive(Default)]
pub struct AwsLambdaTarget;

impl AwsLambdaTarget {
    async fn client(region: &str) -> aws_sdk_lambda::Client {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        aws_sdk_lambda::Client::new(&config)
    }
}

#[async_trait]
impl DeploymentTarget for AwsLambdaTarget {
    async fn rotate_credential(
        &self,
        function: &FunctionRef,
        variable: &str,
        value: &str,
    ) -> Result<(), RotateError> {
        let deployment_error = |reason: String| RotateError::Deployment {
            function: function.name.clone(),
            reason,
        };

        let client = Self::client(&function.region).await;

        let current = client
            .get_function_configuration()
            .function_name(&function.name)
            .send()
            .await
            .map_err(|e| deployment_error(DisplayErrorContext(&e).to_string()))?;

        let existing = current
            .environment()
            .and_then(|environment| environment.variables())
            .cloned()
            .unwrap_or_default();
        tracing::debug!(
            function = %function,
            variables = existing.len(),
            "read current function environment"
        );

        let variables = merge_environment(existing, variable, value);

        client
            .update_function_configuration()
            .function_name(&function.name)
            .environment(Environment::builder().set_variables(Some(variables)).build())
            .send()
            .await
            .map_err(|e| deployment_error(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// Returns `existing` with `variable` set to `value`. Every other variable is
/// kept, since Lambda replaces the whole environment on update.
pub fn merge_environment(
    mut existing: HashMap<String, String>,
    variable: &str,
    value: &str,
) -> HashMap<String, String> {
    existing.insert(variable.to_owned(), value.to_owned());
    existing
}
