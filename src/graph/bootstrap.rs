//! Instance bootstrap script.
//!
//! The script embeds the database address, which only exists once the
//! engine has realised the database instance, so the result is a deferred
//! [`Value`] rather than a string.

use crate::config::{ComputeConfig, DatabaseConfig};
use crate::models::{Attribute, ResourceId, Value};

const APP_PROPERTIES_TMP: &str = "/tmp/application.properties";
const APP_PROPERTIES: &str = "/opt/application.properties";
const AGENT_CTL: &str = "/opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl";
const AGENT_CONFIG: &str = "file:/opt/cloudwatch.json";
const STATSD_PORT: u16 = 8125;

/// JDBC sub-protocol for a database engine name.
fn jdbc_scheme(engine: &str) -> &str {
    match engine {
        "postgres" => "postgresql",
        "aurora-postgresql" => "postgresql",
        "mysql" | "aurora-mysql" => "mysql",
        other => other,
    }
}

/// Hibernate dialect class for a database engine name.
fn hibernate_dialect(engine: &str) -> &'static str {
    match engine {
        "postgres" | "aurora-postgresql" => "org.hibernate.dialect.PostgreSQLDialect",
        "mysql" | "aurora-mysql" => "org.hibernate.dialect.MySQLDialect",
        "mariadb" => "org.hibernate.dialect.MariaDBDialect",
        _ => "org.hibernate.dialect.PostgreSQLDialect",
    }
}

/// `jdbc:<scheme>://<address>:<port>/<db_name>`, resolved when the address is known.
pub fn datasource_url(database: &ResourceId, config: &DatabaseConfig) -> Value {
    Value::Concat(vec![
        Value::from(format!("jdbc:{}://", jdbc_scheme(&config.engine))),
        Value::Ref(database.output(Attribute::Address)),
        Value::from(format!(":{}/{}", config.port, config.db_name)),
    ])
}

fn property(line: &str) -> Value {
    Value::from(format!("echo '{line}' >> {APP_PROPERTIES_TMP}\n"))
}

/// Render the base64 encoded user data for the launch template.
pub fn render_user_data(
    database: &ResourceId,
    db: &DatabaseConfig,
    compute: &ComputeConfig,
) -> Value {
    let mut parts = vec![Value::from("#!/bin/bash\n")];
    parts.extend(
        [
            "spring.jpa.hibernate.ddl-auto=update".to_string(),
            format!(
                "spring.jpa.properties.hibernate.dialect={}",
                hibernate_dialect(&db.engine)
            ),
            "logging.level.org.springframework=debug".to_string(),
            "spring.datasource.hikari.initialization-fail-timeout=-1".to_string(),
            "spring.datasource.hikari.connection-timeout=2000".to_string(),
            format!("spring.datasource.username={}", db.username),
            format!("spring.datasource.password={}", db.password),
            format!("server.port={}", compute.app_port),
            "management.statsd.metrics.export.host=localhost".to_string(),
            format!("management.statsd.metrics.export.port={STATSD_PORT}"),
            "management.endpoints.web.exposure.include=metrics".to_string(),
            "env.domain=localhost".to_string(),
            format!("env.port={STATSD_PORT}"),
        ]
        .iter()
        .map(|line| property(line)),
    );

    parts.push(Value::from("echo 'spring.datasource.url="));
    parts.push(datasource_url(database, db));
    parts.push(Value::from(format!("' >> {APP_PROPERTIES_TMP}\n")));

    parts.push(Value::from(format!(
        "sudo mv {APP_PROPERTIES_TMP} {APP_PROPERTIES}\n"
    )));
    parts.push(Value::from(format!(
        "sudo {AGENT_CTL} -a fetch-config -m ec2 -c {AGENT_CONFIG} -s\n"
    )));

    Value::Base64(Box::new(Value::Concat(parts)))
}
