//! AWS mapper catalog

pub mod cloudwatch;
pub mod dynamodb;
pub mod ebs;
pub mod ec2;
pub mod elb;
pub mod lambda;
pub mod nat_gateway;
pub mod rds;
pub mod s3;

use std::sync::Arc;

use super::indirect::IndirectResourceMapper;
use super::registry::{MapperRegistry, RegistryError};
use super::Cloud;

/// Register every AWS mapper.
pub fn register_all(registry: &MapperRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(ec2::Ec2InstanceMapper))?;
    registry.register(Arc::new(ebs::EbsVolumeMapper))?;
    registry.register(Arc::new(s3::S3BucketMapper))?;
    registry.register(Arc::new(rds::RdsInstanceMapper))?;
    registry.register(Arc::new(lambda::LambdaFunctionMapper))?;
    registry.register(Arc::new(dynamodb::DynamoDbTableMapper))?;
    registry.register(Arc::new(elb::LoadBalancerMapper))?;
    registry.register(Arc::new(nat_gateway::NatGatewayMapper))?;
    registry.register(Arc::new(cloudwatch::CloudWatchLogGroupMapper))?;

    for (resource_type, notes) in [
        ("aws_vpc", "VPCs carry no direct charge"),
        ("aws_subnet", "subnets carry no direct charge"),
        ("aws_security_group", "security groups carry no direct charge"),
        ("aws_iam_role", "IAM roles carry no direct charge"),
        ("aws_route_table", "route tables carry no direct charge"),
    ] {
        registry.register(Arc::new(IndirectResourceMapper::new(
            resource_type,
            Cloud::Aws,
            "network",
            notes,
        )))?;
    }

    Ok(())
}
