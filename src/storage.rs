//! S3 access for linked buckets

use std::str::FromStr;

use log::info;
use rusoto_core::{HttpClient, Region};
use rusoto_credential::DefaultCredentialsProvider;
use rusoto_s3::{GetBucketLocationRequest, S3Client, S3};

use crate::config::ConfigError;

pub fn s3_client(region: Region) -> anyhow::Result<S3Client> {
    Ok(S3Client::new_with(HttpClient::new()?, DefaultCredentialsProvider::new()?, region))
}

pub async fn bucket_region(client: &S3Client, bucket: &str) -> Result<Region, ConfigError> {
    let request = GetBucketLocationRequest {
        bucket: bucket.to_string(),
        ..Default::default()
    };
    let location = client
        .get_bucket_location(request)
        .await
        .map_err(|err| ConfigError::BucketLocation {
            bucket: bucket.to_string(),
            reason: err.to_string(),
        })?
        .location_constraint;

    let region = constraint_region(location)?;
    info!("Bucket {bucket} is in {}", region.name());
    Ok(region)
}

/// Buckets in us-east-1 report no location constraint, old eu-west-1 buckets report `EU`
fn constraint_region(constraint: Option<String>) -> Result<Region, ConfigError> {
    match constraint.as_deref() {
        None | Some("") => Ok(Region::UsEast1),
        Some("EU") => Ok(Region::EuWest1),
        Some(name) => Region::from_str(name).map_err(|_| ConfigError::InvalidRegion(name.to_string())),
    }
}
