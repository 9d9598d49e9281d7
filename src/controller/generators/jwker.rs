use crate::config::OperatorConfig;
use crate::controller::scope::Scope;
use crate::crd::{
    AccessPolicy, InternalRule, Jwker, JwkerAccessPolicy, JwkerAccessPolicyRule, JwkerInbound,
    JwkerOutbound, JwkerSpec,
};
use crate::names::jwker_secret_name;
use kube::api::ObjectMeta;

/// Jwker registering the application with the token broker
///
/// Rules without a namespace are scoped to the SecurityConfig's namespace, and
/// every rule is pinned to the configured cluster.
pub fn jwker(meta: ObjectMeta, scope: &Scope, config: &OperatorConfig) -> Option<Jwker> {
    if !scope.token_exchange.enabled {
        return None;
    }
    let name = meta.name.clone().unwrap_or_default();
    Some(Jwker {
        metadata: meta,
        spec: JwkerSpec {
            secret_name: jwker_secret_name(&name),
            access_policy: scope
                .token_exchange
                .access_policy
                .as_ref()
                .map(|policy| jwker_access_policy(policy, scope.namespace(), &config.cluster_name)),
        },
        status: None,
    })
}

fn jwker_access_policy(policy: &AccessPolicy, namespace: &str, cluster: &str) -> JwkerAccessPolicy {
    let rules = |rules: Option<&Vec<InternalRule>>| -> Vec<JwkerAccessPolicyRule> {
        rules
            .into_iter()
            .flatten()
            .map(|rule| JwkerAccessPolicyRule {
                application: rule.application.clone(),
                namespace: rule
                    .namespace
                    .clone()
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or_else(|| namespace.to_string()),
                cluster: cluster.to_string(),
            })
            .collect()
    };
    JwkerAccessPolicy {
        inbound: Some(JwkerInbound {
            rules: rules(policy.inbound.as_ref().map(|p| &p.rules)),
        }),
        outbound: Some(JwkerOutbound {
            rules: rules(policy.outbound.as_ref().map(|p| &p.rules)),
        }),
    }
}
