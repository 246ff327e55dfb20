//! Prometheus text exposition format.

use std::fmt::Write;

use ecoroute_core::RoutingMode;
use ecoroute_infra::ReconcileAction;

use crate::collector::RoutingMetrics;

/// Render the router's counters as Prometheus text.
pub fn render_prometheus(metrics: &RoutingMetrics) -> String {
    let mut out = String::new();

    out.push_str("# HELP ecoroute_forecasts_total Successful forecasts by routing mode.\n");
    out.push_str("# TYPE ecoroute_forecasts_total counter\n");
    for mode in RoutingMode::ALL {
        let _ = writeln!(
            out,
            "ecoroute_forecasts_total{{mode=\"{}\"}} {}",
            mode.as_str(),
            metrics.forecasts(mode)
        );
    }

    out.push_str("# HELP ecoroute_forecast_failures_total Forecasts where every allowed service failed.\n");
    out.push_str("# TYPE ecoroute_forecast_failures_total counter\n");
    let _ = writeln!(out, "ecoroute_forecast_failures_total {}", metrics.failures());

    out.push_str("# HELP ecoroute_reconcile_total Infrastructure reconciliations by outcome.\n");
    out.push_str("# TYPE ecoroute_reconcile_total counter\n");
    for action in ReconcileAction::ALL {
        let _ = writeln!(
            out,
            "ecoroute_reconcile_total{{action=\"{}\"}} {}",
            action.as_str(),
            metrics.reconciles(action)
        );
    }

    out.push_str("# HELP ecoroute_status_polls_total Status-only sensor polls.\n");
    out.push_str("# TYPE ecoroute_status_polls_total counter\n");
    let _ = writeln!(out, "ecoroute_status_polls_total {}", metrics.status_polls());

    out.push_str("# HELP ecoroute_carbon_intensity_g_per_kwh Last observed grid carbon intensity.\n");
    out.push_str("# TYPE ecoroute_carbon_intensity_g_per_kwh gauge\n");
    let _ = writeln!(out, "ecoroute_carbon_intensity_g_per_kwh {:.2}", metrics.last_intensity());

    out.push_str("# HELP ecoroute_execution_carbon_kg_total Execution carbon reported by prediction services.\n");
    out.push_str("# TYPE ecoroute_execution_carbon_kg_total counter\n");
    let _ = writeln!(out, "ecoroute_execution_carbon_kg_total {:.6}", metrics.execution_carbon_kg());

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty_has_declarations() {
        let output = render_prometheus(&RoutingMetrics::new());
        assert!(output.contains("# TYPE ecoroute_forecasts_total counter"));
        assert!(output.contains("ecoroute_forecasts_total{mode=\"fallback\"} 0"));
        assert!(output.contains("ecoroute_forecast_failures_total 0"));
    }

    #[test]
    fn render_recorded_values() {
        let metrics = RoutingMetrics::new();
        metrics.record_forecast(RoutingMode::Eco, 0.5);
        metrics.record_reconcile(ReconcileAction::Stopped);
        metrics.record_reading(600.0);

        let output = render_prometheus(&metrics);
        assert!(output.contains("ecoroute_forecasts_total{mode=\"eco\"} 1"));
        assert!(output.contains("ecoroute_reconcile_total{action=\"stopped\"} 1"));
        assert!(output.contains("ecoroute_carbon_intensity_g_per_kwh 600.00"));
        assert!(output.contains("ecoroute_execution_carbon_kg_total 0.500000"));
    }

    #[test]
    fn every_sample_line_has_a_value() {
        let output = render_prometheus(&RoutingMetrics::new());
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let value = line.rsplit(' ').next().unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad sample line: {line}");
        }
    }
}
