//! Conversion of collected families to the Prometheus text format.

use anyhow::{Context, Result};
use kubeflat_core::MetricFamily;
use prometheus::proto::{self, MetricType};
use prometheus::{Encoder, TextEncoder};

fn to_proto(family: &MetricFamily) -> proto::MetricFamily {
    let mut mf = proto::MetricFamily::default();
    mf.set_name(family.name.clone());
    mf.set_help(family.help.clone());
    mf.set_field_type(MetricType::GAUGE);
    for (labels, value) in &family.samples {
        let mut m = proto::Metric::default();
        for (k, v) in labels.iter() {
            let mut lp = proto::LabelPair::default();
            lp.set_name(k.to_string());
            lp.set_value(v.to_string());
            m.mut_label().push(lp);
        }
        let mut g = proto::Gauge::default();
        g.set_value(*value);
        m.set_gauge(g);
        mf.mut_metric().push(m);
    }
    mf
}

/// Encode families in order. Families without samples are left out.
pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let protos: Vec<proto::MetricFamily> = families
        .iter()
        .filter(|f| !f.samples.is_empty())
        .map(to_proto)
        .collect();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&protos, &mut buf).context("encoding text exposition")?;
    String::from_utf8(buf).context("exposition is not utf-8")
}
