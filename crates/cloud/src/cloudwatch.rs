//! Monitoring sink that writes one CloudWatch datum per metric.

use async_trait::async_trait;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};

use actionrunner_core::metric::{Metric, MetricSink, PublishError};

use crate::describe;

pub struct CloudWatchMetricSink {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchMetricSink {
    pub fn new(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_cloudwatch::Client::new(config))
    }
}

#[async_trait]
impl MetricSink for CloudWatchMetricSink {
    async fn put_metric(&self, metric: &Metric) -> Result<(), PublishError> {
        self.client
            .put_metric_data()
            .namespace(&metric.namespace)
            .metric_data(to_datum(metric))
            .send()
            .await
            .map_err(|e| {
                let message = describe(&e);
                if e.as_service_error().is_some() {
                    PublishError::Rejected {
                        name: metric.name.clone(),
                        message,
                    }
                } else {
                    PublishError::Transport(message)
                }
            })?;

        tracing::info!(
            namespace = %metric.namespace,
            name = %metric.name,
            value = metric.value,
            "Metric published"
        );
        Ok(())
    }
}

pub(crate) fn to_datum(metric: &Metric) -> MetricDatum {
    let dimensions = metric
        .dimensions
        .iter()
        .map(|(name, value)| Dimension::builder().name(name).value(value).build())
        .collect::<Vec<_>>();

    MetricDatum::builder()
        .metric_name(&metric.name)
        .set_dimensions(Some(dimensions))
        .value(metric.value)
        .unit(StandardUnit::from(metric.unit.as_str()))
        .build()
}
